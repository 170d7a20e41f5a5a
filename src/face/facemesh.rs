//! A wrapper around MediaPipe's [Face Mesh] landmark predictor network.
//!
//! The network estimates 468 landmarks on a cropped, roughly centered face. [`FaceMesh`] tracks
//! the face between frames by cropping each frame around the landmarks found in the previous
//! one, which makes it usable on full webcam frames without a separate face detector, as long as
//! the face starts out near the center of the frame.
//!
//! [Face Mesh]: https://google.github.io/mediapipe/solutions/face_mesh.html

use std::path::Path;

use anyhow::{bail, Context};
use tract_onnx::prelude::{
    tract_ndarray::Array4, tvec, DatumExt, Framework, Graph, InferenceFact, InferenceModelExt,
    SimplePlan, Tensor, TypedFact, TypedOp,
};

use crate::{
    image::{AspectRatio, Image, Rect, Resolution},
    landmark::{Detection, Keypoint, LandmarkSource},
    timer::Timer,
};

type Model = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Number of landmarks produced by the network.
pub const NUM_LANDMARKS: usize = 468;

const INPUT_RES: Resolution = Resolution::new(192, 192);

/// Fraction of the shorter frame side covered by the initial search region.
const INITIAL_ROI_SIZE: f32 = 0.75;

/// Assigns a name to certain important landmark indices.
///
/// "Left" and "Right" are relative to the input image, not from the PoV of the depicted person.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandmarkIdx {
    NoseTip = 1,
    MouthTop = 13,
    MouthBottom = 14,
    LeftEyeOuterCorner = 33,
    LeftEyebrowInnerCorner = 65,
    MouthLeft = 78,
    LeftEyeInnerCorner = 133,
    LeftEyeBottom = 145,
    Chin = 152,
    LeftEyeTop = 159,
    RightEyeOuterCorner = 263,
    RightEyebrowInnerCorner = 295,
    MouthRight = 308,
    RightEyeInnerCorner = 362,
    RightEyeBottom = 374,
    RightEyeTop = 386,
}

impl LandmarkIdx {
    const ALL: [Self; 16] = [
        Self::NoseTip,
        Self::MouthTop,
        Self::MouthBottom,
        Self::LeftEyeOuterCorner,
        Self::LeftEyebrowInnerCorner,
        Self::MouthLeft,
        Self::LeftEyeInnerCorner,
        Self::LeftEyeBottom,
        Self::Chin,
        Self::LeftEyeTop,
        Self::RightEyeOuterCorner,
        Self::RightEyebrowInnerCorner,
        Self::MouthRight,
        Self::RightEyeInnerCorner,
        Self::RightEyeBottom,
        Self::RightEyeTop,
    ];

    /// Returns the name given to keypoints with this index.
    pub fn name(self) -> &'static str {
        match self {
            Self::NoseTip => "noseTip",
            Self::MouthTop => "mouthTop",
            Self::MouthBottom => "mouthBottom",
            Self::LeftEyeOuterCorner => "leftEyeOuterCorner",
            Self::LeftEyebrowInnerCorner => "leftEyebrowInnerCorner",
            Self::MouthLeft => "mouthLeft",
            Self::LeftEyeInnerCorner => "leftEyeInnerCorner",
            Self::LeftEyeBottom => "leftEyeBottom",
            Self::Chin => "chin",
            Self::LeftEyeTop => "leftEyeTop",
            Self::RightEyeOuterCorner => "rightEyeOuterCorner",
            Self::RightEyebrowInnerCorner => "rightEyebrowInnerCorner",
            Self::MouthRight => "mouthRight",
            Self::RightEyeInnerCorner => "rightEyeInnerCorner",
            Self::RightEyeBottom => "rightEyeBottom",
            Self::RightEyeTop => "rightEyeTop",
        }
    }

    /// Looks up the named landmark with index `index`.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.into_iter().find(|idx| *idx as usize == index)
    }
}

/// Region of interest tracking between frames.
#[derive(Debug, Clone)]
struct RoiTracker {
    roi: Option<Rect>,
    loss_thresh: f32,
    padding: f32,
}

impl RoiTracker {
    const DEFAULT_LOSS_THRESHOLD: f32 = 0.5;

    const DEFAULT_ROI_PADDING: f32 = 0.3;

    fn new() -> Self {
        Self {
            roi: None,
            loss_thresh: Self::DEFAULT_LOSS_THRESHOLD,
            padding: Self::DEFAULT_ROI_PADDING,
        }
    }

    /// Returns the (clamped, non-empty) region of `frame` the network should look at.
    fn view_rect(&self, frame: Rect) -> Rect {
        let roi = self.roi.unwrap_or_else(|| {
            let (cx, cy) = frame.center();
            let size = frame.width().min(frame.height()) * INITIAL_ROI_SIZE;
            Rect::from_center(cx, cy, size, size)
        });
        let clamped = roi.clamp_to(frame);
        if clamped.width() < 1.0 || clamped.height() < 1.0 {
            return frame;
        }
        clamped
    }

    /// Updates the region of interest with a new estimate.
    ///
    /// Returns `false` if tracking was lost, in which case the estimate should be discarded.
    fn update(&mut self, confidence: f32, keypoints: &[Keypoint]) -> bool {
        if confidence < self.loss_thresh {
            if self.roi.is_some() {
                log::debug!(
                    "face tracking lost (confidence {confidence:.2} < {})",
                    self.loss_thresh
                );
            }
            self.roi = None;
            return false;
        }

        self.roi = Rect::bounding(keypoints.iter().map(|kp| [kp.x, kp.y]))
            .map(|rect| rect.grow_rel(self.padding).grow_to_fit_aspect(AspectRatio::SQUARE));
        true
    }
}

/// MediaPipe Face Mesh landmark estimator, running on the CPU via `tract`.
pub struct FaceMesh {
    model: Model,
    tracker: RoiTracker,
    t_resize: Timer,
    t_infer: Timer,
}

impl FaceMesh {
    /// Loads the `face_landmark.onnx` network from `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        match path.extension() {
            Some(ext) if ext == "onnx" => {}
            _ => bail!(
                "landmark model path '{}' must have `.onnx` extension",
                path.display()
            ),
        }

        let input_fact: InferenceFact = f32::fact([
            1,
            3,
            INPUT_RES.height() as usize,
            INPUT_RES.width() as usize,
        ])
        .into();
        let model = tract_onnx::onnx()
            .model_for_path(path)
            .and_then(|graph| graph.with_input_fact(0, input_fact))
            .and_then(|graph| graph.into_optimized())
            .and_then(|graph| graph.into_runnable())
            .with_context(|| format!("failed to load landmark model '{}'", path.display()))?;

        let outputs = model.model().outputs.len();
        if outputs < 2 {
            bail!("face mesh network must have 2 outputs, this one has {outputs}");
        }

        log::debug!("loaded face mesh network from '{}'", path.display());
        Ok(Self {
            model,
            tracker: RoiTracker::new(),
            t_resize: Timer::new("resize"),
            t_infer: Timer::new("infer"),
        })
    }

    fn infer(&self, input: &Image) -> anyhow::Result<(Vec<[f32; 3]>, f32)> {
        // NCHW, colors mapped to -1.0..=1.0
        let tensor: Tensor = Array4::from_shape_fn(
            (1, 3, input.height() as usize, input.width() as usize),
            |(_, c, y, x)| input.get(x as u32, y as u32)[c] as f32 / 127.5 - 1.0,
        )
        .into();

        let outputs = self.model.run(tvec!(tensor.into()))?;
        let coords = outputs[0].to_array_view::<f32>()?;
        let coords = coords.iter().copied().collect::<Vec<_>>();
        let Some(&flag) = outputs[1].to_array_view::<f32>()?.iter().next() else {
            bail!("face mesh network produced an empty face flag");
        };

        decode_outputs(&coords, flag)
    }
}

impl LandmarkSource for FaceMesh {
    fn num_keypoints(&self) -> usize {
        NUM_LANDMARKS
    }

    fn estimate_faces(&mut self, frame: &Image) -> anyhow::Result<Vec<Detection>> {
        let view = self.tracker.view_rect(frame.rect());
        let input = self.t_resize.time(|| frame.crop_resized(view, INPUT_RES));
        let (positions, confidence) = self.t_infer.time(|| self.infer(&input))?;
        log::trace!("face confidence {confidence:.3} in {view:?}");

        let keypoints = to_keypoints(&positions, view);
        if !self.tracker.update(confidence, &keypoints) {
            return Ok(Vec::new());
        }
        Ok(vec![Detection::new(keypoints, confidence)])
    }

    fn timers(&self) -> Vec<&Timer> {
        vec![&self.t_resize, &self.t_infer]
    }
}

/// Groups the raw landmark coordinates into positions and turns the face flag into a
/// confidence.
///
/// Fails if the network produced the wrong number of coordinates, or any non-finite value.
fn decode_outputs(coords: &[f32], flag: f32) -> anyhow::Result<(Vec<[f32; 3]>, f32)> {
    if coords.len() != NUM_LANDMARKS * 3 {
        bail!(
            "face mesh network produced {} coordinates, expected {}",
            coords.len(),
            NUM_LANDMARKS * 3
        );
    }
    if !flag.is_finite() {
        bail!("face mesh network produced a non-finite face flag ({flag})");
    }
    if let Some(pos) = coords.iter().position(|c| !c.is_finite()) {
        bail!(
            "face mesh network produced a non-finite coordinate ({}) for landmark {}",
            coords[pos],
            pos / 3
        );
    }

    let positions = coords
        .chunks_exact(3)
        .map(|c| [c[0], c[1], c[2]])
        .collect();
    Ok((positions, sigmoid(flag)))
}

/// Maps network-space positions into the frame, given the frame region that was fed to the
/// network.
fn to_keypoints(positions: &[[f32; 3]], view: Rect) -> Vec<Keypoint> {
    let sx = view.width() / INPUT_RES.width() as f32;
    let sy = view.height() / INPUT_RES.height() as f32;
    positions
        .iter()
        .enumerate()
        .map(|(i, &[x, y, z])| {
            let kp = Keypoint::new(view.x() + x * sx, view.y() + y * sy).with_z(z * sx);
            match LandmarkIdx::from_index(i) {
                Some(idx) => kp.with_name(idx.name()),
                None => kp,
            }
        })
        .collect()
}

fn sigmoid(v: f32) -> f32 {
    1.0 / (1.0 + (-v).exp())
}
