use clap::Parser;
use core::convert::Infallible;
use core::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use embassy_executor::{Executor, Spawner};
use embedded_hal::{digital, pwm};
use qpos_core::mk_static;
use qpos_core::utils::controllers::{
    ControlLoop, HBridge, PositionSource, QuadratureCounter, QuadratureDecoder, SharedState,
};
use qpos_core::utils::motion::{MotionCommand, MotionSequencer, MOTION_CHANNEL};
use qpos_core::utils::{Duration, Instant, Ticker};
use static_cell::StaticCell;
use std::io::BufRead;
use tracing::{info, warn};

#[derive(Parser)]
#[clap(version = "1.0")]
struct Opts
{
    /// motion profile to run (1: short sweep, 2: long stroke)
    #[clap(long, default_value_t = 1)]
    profile: u8,
    /// hold this position instead of running a profile
    #[clap(long, allow_hyphen_values = true)]
    goto: Option<i16>,
    /// stop the simulation after this many seconds
    #[clap(long, default_value_t = 20)]
    seconds: u64,
    /// start with control disabled; send JSON commands on stdin
    #[clap(long)]
    disabled: bool,
}

/// Bridge line and duty levels as seen by the simulated motor.
struct BridgeLines {
    increase: AtomicBool,
    decrease: AtomicBool,
    duty: AtomicU16,
}

struct SimLine(&'static AtomicBool);

impl digital::ErrorType for SimLine {
    type Error = Infallible;
}

impl digital::OutputPin for SimLine {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.0.store(false, Ordering::Release);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.0.store(true, Ordering::Release);
        Ok(())
    }
}

struct SimPwm(&'static AtomicU16);

impl pwm::ErrorType for SimPwm {
    type Error = Infallible;
}

impl pwm::SetDutyCycle for SimPwm {
    fn max_duty_cycle(&self) -> u16 {
        255
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        self.0.store(duty, Ordering::Release);
        Ok(())
    }
}

type SimLoop = ControlLoop<'static, &'static QuadratureCounter, HBridge<SimLine, SimLine, SimPwm>>;

/// Plant update rate.
const PLANT_PERIOD: Duration = Duration::from_millis(1);
/// No motion below this duty.
const STALL_DUTY: u16 = 130;
/// Counts per millisecond at full duty.
const TOP_SPEED: f32 = 1.2;
/// Fraction of the speed error closed each millisecond.
const RESPONSE: f32 = 0.05;

/// Geared DC motor with stiction, a hard brake and a 4× quadrature encoder.
struct SimMotor {
    position: f32,
    velocity: f32,
    count: i32,
    decoder: QuadratureDecoder,
}

impl SimMotor {
    const PHASES: [(bool, bool); 4] = [(false, false), (false, true), (true, true), (true, false)];

    fn new() -> Self {
        Self {
            position: 0.0,
            velocity: 0.0,
            count: 0,
            decoder: QuadratureDecoder::new(false, false),
        }
    }

    fn step(&mut self, lines: &BridgeLines, counter: &QuadratureCounter) {
        let inc = lines.increase.load(Ordering::Acquire);
        let dec = lines.decrease.load(Ordering::Acquire);
        let duty = lines.duty.load(Ordering::Acquire);

        if inc == dec {
            // both low with full duty brakes; anything else coasts
            if duty == 255 {
                self.velocity = 0.0;
            } else {
                self.velocity *= 1.0 - RESPONSE;
            }
        } else {
            let speed = if duty < STALL_DUTY {
                0.0
            } else {
                TOP_SPEED * (duty - STALL_DUTY) as f32 / (255 - STALL_DUTY) as f32
            };
            let target = if inc { speed } else { -speed };
            self.velocity += (target - self.velocity) * RESPONSE;
        }
        self.position += self.velocity;

        let goal = self.position.round() as i32;
        while self.count != goal {
            self.count += if goal > self.count { 1 } else { -1 };
            let (a, b) = Self::PHASES[self.count.rem_euclid(4) as usize];
            self.decoder.update(counter, a, b);
        }
    }
}

#[embassy_executor::task]
async fn control_task(mut ctl: SimLoop) -> ! {
    ctl.run().await
}

#[embassy_executor::task]
async fn plant_task(lines: &'static BridgeLines, counter: &'static QuadratureCounter) -> ! {
    let mut motor = SimMotor::new();
    let mut ticker = Ticker::every(PLANT_PERIOD);
    loop {
        ticker.next().await;
        motor.step(lines, counter);
    }
}

#[embassy_executor::task]
async fn motion_task(mut sequencer: MotionSequencer<'static>) -> ! {
    sequencer.run().await
}

/// Stand-in for the position display: log what an LCD would show.
#[embassy_executor::task]
async fn display_task(
    shared: &'static SharedState,
    counter: &'static QuadratureCounter,
    seconds: u64,
) {
    let started = Instant::now();
    let mut ticker = Ticker::every(Duration::from_millis(250));
    while started.elapsed() < Duration::from_secs(seconds) {
        ticker.next().await;
        info!(
            position = shared.position(),
            setpoint = shared.setpoint(),
            enabled = shared.is_enabled(),
            "Position"
        );
    }
    info!(final_position = counter.read(), "Simulation finished");
    std::process::exit(0);
}

/// Forward JSON command frames typed on stdin to the motion channel.
fn spawn_stdin_reader() {
    std::thread::spawn(|| {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            match MotionCommand::from_json(line.trim().as_bytes()) {
                Ok(command) => {
                    if MOTION_CHANNEL.try_send(command).is_err() {
                        warn!("motion channel full, dropped {:?}", command);
                    }
                }
                Err(e) => warn!("ignoring command frame {:?}: {:?}", line, e),
            }
        }
    });
}

#[embassy_executor::task]
async fn main_task(spawner: Spawner, opts: Opts) {
    let shared = &*mk_static!(SharedState, SharedState::new());
    let counter = &*mk_static!(QuadratureCounter, QuadratureCounter::new());
    let lines = &*mk_static!(
        BridgeLines,
        BridgeLines {
            increase: AtomicBool::new(false),
            decrease: AtomicBool::new(false),
            duty: AtomicU16::new(0),
        }
    );

    let bridge = HBridge::new(
        SimLine(&lines.increase),
        SimLine(&lines.decrease),
        SimPwm(&lines.duty),
    );
    let ctl = ControlLoop::init(counter, bridge, shared, None);

    spawner.spawn(plant_task(lines, counter)).unwrap();
    spawner.spawn(control_task(ctl)).unwrap();
    spawner.spawn(motion_task(MotionSequencer::new(shared))).unwrap();
    spawner.spawn(display_task(shared, counter, opts.seconds)).unwrap();

    let sender = MOTION_CHANNEL.sender();
    match (opts.goto, opts.disabled) {
        (_, true) => info!("Control disabled, waiting for commands on stdin"),
        (Some(p), false) => {
            sender.send(MotionCommand::Goto { p }).await;
            sender.send(MotionCommand::Enable).await;
        }
        (None, false) => sender.send(MotionCommand::Profile { id: opts.profile }).await,
    }
    spawn_stdin_reader();
}

static EXECUTOR: StaticCell<Executor> = StaticCell::new();

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
    let opts: Opts = Opts::parse();
    info!(profile = opts.profile, goto = ?opts.goto, "Starting position servo simulation");

    let executor = EXECUTOR.init(Executor::new());
    executor.run(|spawner| {
        spawner.spawn(main_task(spawner, opts)).unwrap();
    });
}
