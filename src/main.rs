mod config;
#[cfg(not(target_os = "espidf"))]
mod dry_run;

use config::Config;

#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    use config::MAX_LAYERS;
    use esp_idf_svc::{
        hal::{
            gpio::{OutputPin as _, PinDriver, Pull},
            peripherals::Peripherals,
        },
        log::EspLogger,
        timer::EspTaskTimerService,
    };
    use flagger::Flagger;
    use log::*;
    use print_state::PrintSequencer;
    use std::thread;
    use std::time::{Duration, Instant};
    use stepper::{MotorLink, StepperDriver};

    // Shared between the microstep timer and the logic loop below.
    static MOTOR: MotorLink = MotorLink::new();

    // Required for ESP-IDF patches
    esp_idf_svc::sys::link_patches();
    EspLogger::initialize_default();

    let config = Config::load()?;
    let peripherals = Peripherals::take()?;

    // ======== Lift motor ========
    let coils = [
        PinDriver::output(peripherals.pins.gpio8.downgrade_output())?,
        PinDriver::output(peripherals.pins.gpio9.downgrade_output())?,
        PinDriver::output(peripherals.pins.gpio10.downgrade_output())?,
        PinDriver::output(peripherals.pins.gpio11.downgrade_output())?,
    ];
    let mut driver = StepperDriver::new(&MOTOR, coils, config.stepper_config())?;
    driver.zero();

    let timer_service = EspTaskTimerService::new()?;
    let microstep_timer = timer_service.timer(move || driver.micro_step())?;
    microstep_timer.every(Duration::from_micros(config.stepper.microstep_period_us))?;
    info!(
        "Microstep timer running every {} us",
        config.stepper.microstep_period_us
    );

    // ======== Camera and external trigger ========
    let camera = PinDriver::output(peripherals.pins.gpio12)?;
    let mut trigger = PinDriver::input(peripherals.pins.gpio13)?;
    trigger.set_pull(Pull::Down)?;

    // ======== Print sequencing ========
    let mut flags = Flagger::<4>::new();
    let mut sequencer = PrintSequencer::<_, MAX_LAYERS>::new(camera, config.geometry(), &mut flags)?;
    config.load_layers(&mut sequencer)?;
    sequencer.start(&MOTOR)?;

    let tick = Duration::from_secs_f64(config.timing.tick_seconds);
    let mut trigger_was_high = false;

    loop {
        let started = Instant::now();

        let trigger_high = trigger.is_high();
        if trigger_high && !trigger_was_high {
            sequencer.on_external_trigger();
        }
        trigger_was_high = trigger_high;

        flags.tick();
        sequencer.tick(&mut flags, &MOTOR);

        if sequencer.status().is_done() && !sequencer.capture_in_flight() {
            break;
        }

        if let Some(rest) = tick.checked_sub(started.elapsed()) {
            thread::sleep(rest);
        }
    }

    info!(
        "Print {:?} at layer {}, lift at {} steps",
        sequencer.status(),
        sequencer.active_layer(),
        MOTOR.position()
    );

    // Keep the timer alive so the motor keeps its holding torque.
    loop {
        thread::sleep(Duration::from_secs(60));
    }
}

#[cfg(not(target_os = "espidf"))]
fn main() -> anyhow::Result<()> {
    let config = Config::load()?;
    let report = dry_run::run(&config)?;

    for entry in &report.entries {
        println!(
            "tick {:>8}  layer {:>3} -> {} steps",
            entry.tick, entry.layer, entry.target_steps
        );
    }
    println!(
        "{:?} after {} ticks ({:.2} s): {} captures, {} external triggers, lift at {} steps",
        report.status,
        report.ticks,
        report.seconds,
        report.captures,
        report.triggers,
        report.final_position
    );
    Ok(())
}
