//! The application: wires the camera, the landmark model and the detection loop together, and
//! shows the result.
//!
//! Everything the [`Controller`] needs is delivered as an [`Event`] over a single channel, so the
//! application thread is the only one touching the controller. Blocking work runs elsewhere:
//!
//! - the landmark model is loaded on a short-lived loader thread,
//! - detection runs on a [`Worker`] owning the [`LandmarkSource`],
//! - the webcam is read on its own thread, which publishes the latest frame into a shared slot.

use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread,
    time::Instant,
};

use anyhow::{anyhow, Context};
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use pawawwewism::Worker;

use crate::{
    config::Config,
    controller::{Completion, Controller},
    face::FaceMesh,
    gui,
    image::{draw, BlendMode, Color, Image, Resolution},
    landmark::{Detection, LandmarkSource},
    mesh::TriangulationTable,
    session::{Control, Session},
    sketch::{RoughCanvas, SketchOptions},
    timer::FpsCounter,
    video::webcam::{Webcam, WebcamOptions},
};

/// Window title.
pub const TITLE: &str = "Live with your emotions";

/// Something that happened, reported to the application thread.
pub enum Event {
    Control(Control),
    ModelLoaded(anyhow::Result<Box<dyn LandmarkSource>>),
    CameraOpened(Resolution),
    CameraFailed(anyhow::Error),
    CameraLost(anyhow::Error),
    /// The webcam published a new frame into the shared slot.
    FrameReady,
    Detected {
        seq: u64,
        result: anyhow::Result<Vec<Detection>>,
    },
}

impl From<Control> for Event {
    fn from(control: Control) -> Self {
        Self::Control(control)
    }
}

/// Loading state of the landmark model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelStatus {
    Loading,
    Loaded,
    Failed,
}

/// State of the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraStatus {
    Inactive,
    Opening,
    Active,
}

/// A line of the status display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub text: &'static str,
    pub color: Color,
}

impl StatusLine {
    fn new(text: &'static str, color: Color) -> Self {
        Self { text, color }
    }
}

const DISABLED: Color = Color::GREY;

/// Returns the lines of the status display, top to bottom.
///
/// The first two lines report the model and camera state, the remaining ones list the controls.
/// The detection control is greyed out while it is disabled.
pub fn status_lines(
    session: &Session,
    model: ModelStatus,
    camera: CameraStatus,
) -> Vec<StatusLine> {
    let model = match model {
        ModelStatus::Loading => StatusLine::new("Model loading", Color::YELLOW),
        ModelStatus::Loaded => StatusLine::new("Model loaded", Color::GREEN),
        ModelStatus::Failed => StatusLine::new("Model failed to load", Color::RED),
    };
    let video = match camera {
        CameraStatus::Active => StatusLine::new("Video activated", Color::GREEN),
        CameraStatus::Opening | CameraStatus::Inactive => {
            StatusLine::new("Video not activated", Color::YELLOW)
        }
    };
    let camera_control = match camera {
        CameraStatus::Inactive => StatusLine::new("[C] Activate the camera", Color::WHITE),
        CameraStatus::Opening | CameraStatus::Active => {
            StatusLine::new("[C] Activate the camera", DISABLED)
        }
    };
    let detection_text = if session.detecting() {
        "[Space] Stop the detection"
    } else {
        "[Space] Begin the detection"
    };
    let detection_color = if session.can_toggle() {
        Color::WHITE
    } else {
        DISABLED
    };

    vec![
        model,
        video,
        camera_control,
        StatusLine::new(detection_text, detection_color),
    ]
}

struct DetectRequest {
    seq: u64,
    frame: Image,
}

pub struct App {
    config: Config,
    table: Arc<TriangulationTable>,
    controller: Controller<RoughCanvas>,
    events: Sender<Event>,
    receiver: Receiver<Event>,
    detector: Option<Worker<DetectRequest>>,
    model: ModelStatus,
    camera: CameraStatus,
    frame: Arc<Mutex<Option<Image>>>,
    /// Set by the webcam thread when it publishes a frame, cleared when the app picks it up.
    frame_pending: Arc<AtomicBool>,
    fps: FpsCounter,
}

impl App {
    /// Creates the application and the channel its events are delivered on.
    ///
    /// The returned [`Sender`] is used by the GUI to deliver keyboard controls.
    pub fn new(config: Config) -> anyhow::Result<(Self, Sender<Event>)> {
        let table = config.triangulation_table()?;
        let canvas = RoughCanvas::new(
            config.resolution,
            SketchOptions {
                roughness: config.roughness,
                ..SketchOptions::default()
            },
        );
        let controller = Controller::new(canvas, table.clone(), config.interval);
        let (events, receiver) = channel::unbounded();

        let app = Self {
            config,
            table,
            controller,
            events: events.clone(),
            receiver,
            detector: None,
            model: ModelStatus::Loading,
            camera: CameraStatus::Inactive,
            frame: Arc::new(Mutex::new(None)),
            frame_pending: Arc::new(AtomicBool::new(false)),
            fps: FpsCounter::new("display"),
        };
        Ok((app, events))
    }

    /// Runs the application until the user quits.
    pub fn run(mut self) -> anyhow::Result<()> {
        spawn_model_loader(self.config.model.clone(), self.events.clone())?;
        self.present();

        loop {
            let event = match self.controller.next_deadline() {
                Some(deadline) => match self.receiver.recv_deadline(deadline) {
                    Ok(event) => Some(event),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                },
                None => match self.receiver.recv() {
                    Ok(event) => Some(event),
                    Err(_) => break,
                },
            };

            if let Some(event) = event {
                if !self.handle(event)? {
                    log::info!("exiting");
                    break;
                }
            }
            self.poll_tick(Instant::now());
            self.present();
        }
        Ok(())
    }

    /// Handles one event. Returns `false` if the application should exit.
    fn handle(&mut self, event: Event) -> anyhow::Result<bool> {
        match event {
            Event::Control(Control::Quit) => return Ok(false),
            Event::Control(Control::ActivateCamera) => self.activate_camera()?,
            Event::Control(Control::ToggleDetection) => {
                self.controller.toggle(Instant::now());
            }
            Event::ModelLoaded(Ok(source)) => self.model_loaded(source)?,
            Event::ModelLoaded(Err(e)) => {
                log::error!("failed to load landmark model: {e:#}");
                self.model = ModelStatus::Failed;
            }
            Event::CameraOpened(res) => {
                self.camera = CameraStatus::Active;
                self.controller.renderer_mut().resize(res);
                self.controller.video_ready();
            }
            Event::CameraFailed(e) => {
                log::error!("failed to open webcam: {e:#}");
                self.camera = CameraStatus::Inactive;
            }
            Event::CameraLost(e) => {
                log::error!("webcam stopped working: {e:#}");
                self.camera = CameraStatus::Inactive;
                self.lock_frame().take();
                self.controller.video_lost();
            }
            Event::FrameReady => {
                self.frame_pending.store(false, Ordering::Release);
            }
            Event::Detected { seq, result } => {
                if let Completion::Applied(report) = self.controller.complete(seq, result) {
                    if report.skipped > 0 {
                        log::debug!("{} detection(s) did not match the mesh", report.skipped);
                    }
                }
            }
        }
        Ok(true)
    }

    fn model_loaded(&mut self, source: Box<dyn LandmarkSource>) -> anyhow::Result<()> {
        if let Err(e) = self.table.validate(source.num_keypoints()) {
            log::error!("landmark model does not fit the triangulation: {e:#}");
            self.model = ModelStatus::Failed;
            return Ok(());
        }
        self.detector = Some(spawn_detector(source, self.events.clone())?);
        self.model = ModelStatus::Loaded;
        self.controller.model_ready();
        Ok(())
    }

    fn activate_camera(&mut self) -> anyhow::Result<()> {
        if self.camera != CameraStatus::Inactive {
            log::debug!("camera is already {:?}", self.camera);
            return Ok(());
        }

        let mut options = WebcamOptions::default().resolution(self.config.resolution);
        if let Some(name) = &self.config.webcam_name {
            options = options.name(name.clone());
        }
        self.camera = CameraStatus::Opening;
        spawn_webcam(
            options,
            self.frame.clone(),
            self.frame_pending.clone(),
            self.events.clone(),
        )?;
        Ok(())
    }

    fn lock_frame(&self) -> std::sync::MutexGuard<'_, Option<Image>> {
        self.frame.lock().unwrap_or_else(|poison| poison.into_inner())
    }

    /// Dispatches a detection request if a tick is due. Without a frame or a detector, the tick
    /// completes right away with no detections.
    fn poll_tick(&mut self, now: Instant) {
        let Some(seq) = self.controller.poll_tick(now) else {
            return;
        };
        let frame = self.lock_frame().clone();
        match (frame, &mut self.detector) {
            (Some(frame), Some(detector)) => detector.send(DetectRequest { seq, frame }),
            _ => {
                log::trace!("no frame for request #{seq}");
                self.controller.complete(seq, Ok(Vec::new()));
            }
        }
    }

    /// Composes the current frame, the overlay and the status display, and shows the result.
    fn present(&mut self) {
        let overlay = self.controller.renderer().surface();
        let mut image = match self.lock_frame().clone() {
            Some(frame) => frame,
            None => {
                let mut blank = Image::new(overlay.width(), overlay.height());
                blank.clear(Color::BLACK);
                blank
            }
        };
        image.blend_from(overlay, BlendMode::Alpha);

        let lines = status_lines(self.controller.session(), self.model, self.camera);
        let line_height = 15.0;
        for (i, line) in lines.iter().enumerate() {
            draw::text(&mut image, 8.0, 8.0 + i as f32 * line_height, line.text)
                .align_left()
                .align_top()
                .color(line.color);
        }

        gui::show_image(&image);
        self.fps.tick();
    }
}

fn spawn_model_loader(path: PathBuf, events: Sender<Event>) -> anyhow::Result<()> {
    thread::Builder::new()
        .name("model loader".into())
        .spawn(move || {
            log::info!("loading landmark model from '{}'", path.display());
            let result =
                FaceMesh::load(&path).map(|mesh| Box::new(mesh) as Box<dyn LandmarkSource>);
            events.send(Event::ModelLoaded(result)).ok();
        })
        .context("failed to spawn model loader thread")?;
    Ok(())
}

fn spawn_detector(
    mut source: Box<dyn LandmarkSource>,
    events: Sender<Event>,
) -> anyhow::Result<Worker<DetectRequest>> {
    let mut fps = FpsCounter::new("detector");
    let worker = Worker::builder()
        .name("detector")
        .spawn(move |DetectRequest { seq, frame }| {
            let result = catch_unwind(AssertUnwindSafe(|| source.estimate_faces(&frame)))
                .unwrap_or_else(|_| Err(anyhow!("landmark source panicked on request #{seq}")));
            events.send(Event::Detected { seq, result }).ok();
            fps.tick_with(source.timers());
        })
        .context("failed to spawn detector thread")?;
    Ok(worker)
}

fn spawn_webcam(
    options: WebcamOptions,
    slot: Arc<Mutex<Option<Image>>>,
    pending: Arc<AtomicBool>,
    events: Sender<Event>,
) -> anyhow::Result<()> {
    thread::Builder::new()
        .name("webcam".into())
        .spawn(move || {
            let mut webcam = match Webcam::open(options) {
                Ok(webcam) => webcam,
                Err(e) => {
                    events.send(Event::CameraFailed(e)).ok();
                    return;
                }
            };
            if events
                .send(Event::CameraOpened(webcam.resolution()))
                .is_err()
            {
                return;
            }

            let mut fps = FpsCounter::new(webcam.name());
            loop {
                let frame = match webcam.read() {
                    Ok(frame) => frame,
                    Err(e) => {
                        events.send(Event::CameraLost(e)).ok();
                        return;
                    }
                };
                *slot.lock().unwrap_or_else(|poison| poison.into_inner()) = Some(frame);

                // Only one notification is queued at a time.
                if !pending.swap(true, Ordering::AcqRel) && events.send(Event::FrameReady).is_err() {
                    return;
                }
                fps.tick_with(webcam.timers());
            }
        })
        .context("failed to spawn webcam thread")?;
    Ok(())
}
