//! Instrument loop: hardware assembly, stdin control in simulation, signal handling.

use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::Sender;
use eyre::WrapErr;
use spine_core::{FileStore, Session, SessionCfg};
use spine_hardware::{FixedSwitch, LoadHandle, Press, ScriptedButtons, SimulatedCell};
use spine_traits::{Button, MonotonicClock};

/// Options of the `run` command.
#[derive(Debug, Clone, Copy)]
pub struct RunOpts {
    pub max_ticks: Option<u64>,
    pub load_a: f32,
    pub load_b: f32,
    pub sensitivity: f32,
    pub short_spacing: bool,
}

/// One line of simulator input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimCommand {
    Press(Press),
    Load(f32, f32),
    Pause(Duration),
    Quit,
}

/// Parse a stdin line. Blank lines and `#` comments yield `Ok(None)`.
pub fn parse_sim_line(line: &str) -> Result<Option<SimCommand>, String> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };
    let cmd = match head {
        h if h.starts_with('#') => return Ok(None),
        "ok" => SimCommand::Press(Press::short(Button::Confirm)),
        "a" => SimCommand::Press(Press::short(Button::FunctionA)),
        "A" => SimCommand::Press(Press::long(Button::FunctionA)),
        "b" => SimCommand::Press(Press::short(Button::FunctionB)),
        "B" => SimCommand::Press(Press::long(Button::FunctionB)),
        "load" => {
            let mut grams = || -> Result<f32, String> {
                let w = words.next().ok_or("load needs two masses in grams")?;
                w.parse::<f32>().map_err(|e| format!("bad mass {w:?}: {e}"))
            };
            let a = grams()?;
            let b = grams()?;
            SimCommand::Load(a, b)
        }
        "sleep" => {
            let w = words.next().ok_or("sleep needs a duration in ms")?;
            let ms = w.parse::<u64>().map_err(|e| format!("bad duration {w:?}: {e}"))?;
            SimCommand::Pause(Duration::from_millis(ms))
        }
        "quit" | "q" => SimCommand::Quit,
        other => return Err(format!("unknown command {other:?}")),
    };
    Ok(Some(cmd))
}

/// Feed stdin lines to the simulated buttons and load cells until EOF or `quit`.
fn spawn_stdin_reader(presses: Sender<Press>, loads: [LoadHandle; 2], stop: Arc<AtomicBool>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            match parse_sim_line(&line) {
                Ok(Some(SimCommand::Press(p))) => {
                    if presses.send(p).is_err() {
                        break;
                    }
                }
                Ok(Some(SimCommand::Load(a, b))) => {
                    loads[0].set_grams(a);
                    loads[1].set_grams(b);
                    tracing::info!(a_g = a, b_g = b, "simulated load changed");
                }
                Ok(Some(SimCommand::Pause(d))) => std::thread::sleep(d),
                Ok(Some(SimCommand::Quit)) => {
                    stop.store(true, Ordering::Relaxed);
                    break;
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(error = %e, "ignored input line"),
            }
        }
        tracing::debug!("stdin reader finished");
    });
}

fn install_ctrlc(stop: &Arc<AtomicBool>) {
    let flag = Arc::clone(stop);
    if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed)) {
        tracing::warn!(error = %e, "failed to install Ctrl-C handler");
    }
}

fn finish(mut session: Session, opts: &RunOpts, stop: &AtomicBool) -> eyre::Result<u64> {
    let ticks = session.run(opts.max_ticks, stop)?;
    tracing::info!(
        ticks,
        mode = ?session.mode(),
        methodology = session.settings().methodology.label(),
        "run finished"
    );
    Ok(ticks)
}

/// Run the session on simulated hardware, controlled through stdin.
pub fn run_simulated(
    cfg: &spine_config::Config,
    state_file: &Path,
    opts: RunOpts,
) -> eyre::Result<u64> {
    let stop = Arc::new(AtomicBool::new(false));
    install_ctrlc(&stop);

    let cell_a = SimulatedCell::with_sensitivity(opts.sensitivity);
    let cell_b = SimulatedCell::with_sensitivity(opts.sensitivity);
    let loads = [cell_a.handle(), cell_b.handle()];
    let (buttons, presses) = ScriptedButtons::new(MonotonicClock);

    let session = Session::builder()
        .with_load_cells(cell_a, cell_b)
        .with_buttons(buttons)
        .with_display(spine_hardware::TerminalDisplay::stdout(
            cfg.display.rows,
            cfg.display.columns,
        ))
        .with_spacing_switch(FixedSwitch(!opts.short_spacing))
        .with_power(spine_hardware::SimulatedPower::new())
        .with_store(FileStore::new(state_file))
        .with_config(SessionCfg::from(cfg))
        .build()
        .wrap_err("build simulated session")?;

    // Masses placed after the startup zero.
    loads[0].set_grams(opts.load_a);
    loads[1].set_grams(opts.load_b);
    spawn_stdin_reader(presses, loads, Arc::clone(&stop));

    finish(session, &opts, &stop)
}

/// Run the session on the Raspberry Pi: HX711 cells, GPIO buttons and switch.
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub fn run_hardware(
    cfg: &spine_config::Config,
    state_file: &Path,
    opts: RunOpts,
) -> eyre::Result<u64> {
    use spine_hardware::hardware::{GAIN_128_PULSES, GpioButtons, GpioSwitch, Hx711, Hx711Cell};

    let stop = Arc::new(AtomicBool::new(false));
    install_ctrlc(&stop);

    let p = &cfg.pins;
    let gpio = rppal::gpio::Gpio::new().map_err(|e| eyre::eyre!("open gpio: {e}"))?;
    let cell_a = Hx711Cell::new(
        Hx711::new(&gpio, p.hx711_a_dt, p.hx711_a_sck, GAIN_128_PULSES)
            .wrap_err("open hx711 channel A")?,
    )
    .with_retries(2);
    let cell_b = Hx711Cell::new(
        Hx711::new(&gpio, p.hx711_b_dt, p.hx711_b_sck, GAIN_128_PULSES)
            .wrap_err("open hx711 channel B")?,
    )
    .with_retries(2);
    let buttons = GpioButtons::new(&gpio, p.button_confirm, p.button_a, p.button_b, p.active_low)
        .wrap_err("open button pins")?;
    let power = buttons.wake_power();
    let switch =
        GpioSwitch::new(&gpio, p.spacing_switch, p.active_low).wrap_err("open spacing switch")?;

    let session = Session::builder()
        .with_load_cells(cell_a, cell_b)
        .with_buttons(buttons)
        .with_display(spine_hardware::TerminalDisplay::stdout(
            cfg.display.rows,
            cfg.display.columns,
        ))
        .with_spacing_switch(switch)
        .with_power(power)
        .with_store(FileStore::new(state_file))
        .with_config(SessionCfg::from(cfg))
        .build()
        .wrap_err("build hardware session")?;

    finish(session, &opts, &stop)
}
