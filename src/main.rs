//! # picam_guard entry point
//!
//! Wires the three execution contexts together and owns process teardown.
//!
//! ## Startup order
//! - Configuration (`argv[1]`, default `../config.txt`)
//! - Indicator panel on the configured GPIO backend
//! - Media directories, notification worker, command server
//! - Camera capture, then the sensing loop on the main thread
//!
//! Any startup failure after the panel is up still runs the blink-and-release
//! sequence and stops whatever services were already started.

use std::{env, path::Path, process, sync::Arc, thread::JoinHandle};

use env_logger::Env;
use log::{error, info, warn};

use picam_guard::{
    control::state::{ControlState, SharedControl},
    hardware::{
        gpio::{DigitalIo, SYSFS_GPIO_ROOT, SimulatedGpio, SysfsGpio, sysfs_available},
        indicators::{IndicatorPanel, PinMap},
    },
    media::{
        capture::{FrameSource, PipeCapture},
        sink::FfmpegSinkFactory,
        store::MediaStore,
    },
    monitor::{
        detection::{DetectionCadence, MotionDetector},
        recording::RecordingStateMachine,
        sensing::{ExitReason, SensingLoop},
    },
    notify::{
        dispatcher::{LineTransport, NotificationDispatcher},
        outbox::{OUTBOX_CAPACITY, Outbox},
    },
    server::http::{CommandServer, ServerContext, ServerHandle},
    utils::{
        config::{Config, DEFAULT_CONFIG_PATH, GpioBackend},
        error::{ServerError, StartupError},
    },
};

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    info!("=== PICAM GUARD START ===");

    let path = env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = match Config::load(&path) {
        Ok(config) => config,
        Err(e) => {
            error!("[Main] {}", e);
            process::exit(1);
        }
    };
    info!("[Main] configuration loaded from {}", path);

    let result = match config.gpio_backend {
        GpioBackend::Sysfs => {
            if !sysfs_available(Path::new(SYSFS_GPIO_ROOT)) {
                warn!("[Main] {} not found, pin setup will likely fail", SYSFS_GPIO_ROOT);
            }
            run(&config, SysfsGpio::new())
        }
        GpioBackend::Simulated => {
            warn!("[Main] using simulated GPIO; buttons are inert");
            run(&config, SimulatedGpio::new())
        }
    };

    match result {
        Ok(ExitReason::CaptureFailed) => {
            error!("[Main] camera stopped delivering frames");
            process::exit(1);
        }
        Ok(reason) => info!("=== PICAM GUARD FINISHED ({:?}) ===", reason),
        Err(e) => {
            error!("[Main] fatal: {}", e);
            process::exit(1);
        }
    }
}

/// Background services running beside the sensing loop.
struct Services {
    outbox: Outbox,
    outbox_worker: JoinHandle<()>,
    server: ServerHandle,
}

impl Services {
    fn start(config: &Config, control: SharedControl, store: MediaStore) -> Result<Self, StartupError> {
        let transport = LineTransport::new(&config.api_base_url, &config.access_token)?;
        let dispatcher = Arc::new(NotificationDispatcher::new(transport, &config.public_base_url));

        let (outbox, outbox_worker) =
            Outbox::spawn(dispatcher.clone(), config.recipient.clone(), OUTBOX_CAPACITY)?;

        let ctx = ServerContext::new(control, dispatcher, store);
        let server = match CommandServer::bind(config.bind_addr, ctx)
            .and_then(|s| s.spawn().map_err(|e| ServerError::Setup(e.to_string())))
        {
            Ok(server) => server,
            Err(e) => {
                drop(outbox);
                join_worker(outbox_worker);
                return Err(e.into());
            }
        };

        Ok(Self {
            outbox,
            outbox_worker,
            server,
        })
    }

    fn abort(self) {
        let Services {
            outbox,
            outbox_worker,
            mut server,
        } = self;
        server.stop();
        server.join();
        drop(outbox);
        join_worker(outbox_worker);
    }
}

fn join_worker(worker: JoinHandle<()>) {
    if worker.join().is_err() {
        error!("[Main] notification worker panicked");
    }
}

fn release_panel<G: DigitalIo>(mut panel: IndicatorPanel<G>) {
    panel.shutdown_sequence();
    panel.release();
}

fn run<G: DigitalIo>(config: &Config, io: G) -> Result<ExitReason, StartupError> {
    let panel = IndicatorPanel::init(io, PinMap::default())?;
    let control = ControlState::shared();

    let store = MediaStore::new(config.photo_dir.clone(), config.video_dir.clone());
    if let Err(e) = store.ensure_dirs() {
        release_panel(panel);
        return Err(e.into());
    }

    let services = match Services::start(config, control.clone(), store.clone()) {
        Ok(services) => services,
        Err(e) => {
            release_panel(panel);
            return Err(e);
        }
    };

    let source = match PipeCapture::open(
        &config.camera_device,
        config.frame_width,
        config.frame_height,
        config.frame_rate,
    ) {
        Ok(source) => source,
        Err(e) => {
            services.abort();
            release_panel(panel);
            return Err(e.into());
        }
    };

    let Services {
        outbox,
        outbox_worker,
        server,
    } = services;

    let recorder = RecordingStateMachine::new(
        FfmpegSinkFactory,
        store.clone(),
        outbox.clone(),
        source.frame_size(),
        config.frame_rate,
    );
    let sensing = SensingLoop::new(
        control,
        source,
        DetectionCadence::new(MotionDetector::new()),
        recorder,
        store,
        outbox,
        panel,
    )
    .with_server(server);

    let reason = sensing.run();

    // every outbox handle went down with the loop; wait for the queue to drain
    join_worker(outbox_worker);
    Ok(reason)
}
