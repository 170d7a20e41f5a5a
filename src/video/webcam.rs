//! V4L2 webcam access.
//!
//! Only V4L2 `VIDEO_CAPTURE` devices yielding JFIF JPEG or Motion JPEG frames are supported.

use std::cmp::Reverse;

use anyhow::bail;
use linuxvideo::{
    format::{FrameIntervals, FrameSizes, PixFormat, Pixelformat},
    stream::ReadStream,
    BufType, CapabilityFlags, Device, Fract,
};

use crate::{
    image::{Image, Resolution},
    timer::Timer,
};

/// Format negotiation options.
#[derive(Debug, Default, Clone)]
pub struct WebcamOptions {
    name: Option<String>,
    resolution: Option<Resolution>,
    fps: Option<u32>,
}

impl WebcamOptions {
    /// Sets the name of the webcam device to open.
    ///
    /// If no webcam with the given name can be found, opening the webcam will result in an error.
    #[inline]
    pub fn name(self, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..self
        }
    }

    /// Sets the desired image resolution.
    ///
    /// The smallest supported resolution that is at least this large is selected. If there is
    /// none, the largest resolution the camera supports is used instead.
    #[inline]
    pub fn resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = Some(resolution);
        self
    }

    /// Sets the desired frame rate.
    #[inline]
    pub fn fps(mut self, fps: u32) -> Self {
        self.fps = Some(fps);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct FrameFormat {
    resolution: Resolution,
    frame_interval: Fract,
}

impl FrameFormat {
    fn fps(&self) -> f32 {
        (1.0 / self.frame_interval.as_f32()).round()
    }
}

fn negotiate_format(device: &Device, options: &WebcamOptions) -> anyhow::Result<(PixFormat, Fract)> {
    let mut pixel_format = None;
    for format in device.formats(BufType::VIDEO_CAPTURE) {
        let format = format?;
        if format.pixelformat() == Pixelformat::JPEG || format.pixelformat() == Pixelformat::MJPG {
            pixel_format = Some(format.pixelformat());
            break;
        }
    }

    let Some(pixel_format) = pixel_format else {
        bail!("no supported pixel format found");
    };

    let mut formats = Vec::new();
    match device.frame_sizes(pixel_format)? {
        FrameSizes::Discrete(sizes) => {
            for size in sizes {
                let intervals =
                    match device.frame_intervals(pixel_format, size.width(), size.height())? {
                        FrameIntervals::Discrete(intervals) => intervals,
                        FrameIntervals::Stepwise(_) | FrameIntervals::Continuous(_) => {
                            bail!("stepwise or continuous frame rates are not supported")
                        }
                    };
                for rate in intervals {
                    formats.push(FrameFormat {
                        resolution: Resolution::new(size.width(), size.height()),
                        frame_interval: *rate.fract(),
                    });
                }
            }
        }
        FrameSizes::Stepwise(_) | FrameSizes::Continuous(_) => {
            bail!("stepwise or continuous resolutions are not supported");
        }
    }

    let Some(fmt) = select_format(&formats, options) else {
        bail!("failed to negotiate a webcam format");
    };
    Ok((
        PixFormat::new(
            fmt.resolution.width(),
            fmt.resolution.height(),
            pixel_format,
        ),
        fmt.frame_interval,
    ))
}

/// Picks the format closest to the requested one.
///
/// Among the formats at least as large as the requested resolution, the smallest one wins, since
/// the overlay is drawn at frame resolution. Frame rate breaks ties. If no format is large
/// enough, the largest one is used.
fn select_format(formats: &[FrameFormat], options: &WebcamOptions) -> Option<FrameFormat> {
    let large_enough = |fmt: &&FrameFormat| {
        options.resolution.map_or(true, |res| {
            fmt.resolution.width() >= res.width() && fmt.resolution.height() >= res.height()
        })
    };
    let fast_enough =
        |fmt: &&FrameFormat| options.fps.map_or(true, |fps| fmt.fps() >= fps as f32);

    let by_preference =
        |fmt: &&FrameFormat| (Reverse(fmt.resolution.num_pixels()), fmt.fps() as u32);
    if let Some(fmt) = formats
        .iter()
        .filter(large_enough)
        .filter(fast_enough)
        .max_by_key(by_preference)
    {
        return Some(*fmt);
    }
    if let Some(fmt) = formats.iter().filter(large_enough).max_by_key(by_preference) {
        log::debug!("no format reaches {:?} FPS, ignoring frame rate", options.fps);
        return Some(*fmt);
    }

    log::debug!(
        "no format reaches {:?}, using the largest one",
        options.resolution
    );
    formats
        .iter()
        .max_by_key(|fmt| (fmt.resolution.num_pixels(), fmt.fps() as u32))
        .copied()
}

/// A webcam yielding a stream of [`Image`]s.
pub struct Webcam {
    stream: ReadStream,
    name: String,
    resolution: Resolution,
    last_frame: Option<Image>,
    t_dequeue: Timer,
    t_decode: Timer,
}

impl Webcam {
    /// Opens the first supported webcam found.
    ///
    /// This function can block for a significant amount of time while the webcam initializes (on
    /// the order of hundreds of milliseconds).
    pub fn open(options: WebcamOptions) -> anyhow::Result<Self> {
        for res in linuxvideo::list()? {
            match res {
                Ok(dev) => match Self::open_impl(dev, &options) {
                    Ok(Some(webcam)) => return Ok(webcam),
                    Ok(None) => {}
                    Err(e) => {
                        log::debug!("{}", e);
                    }
                },
                Err(e) => {
                    log::warn!("{}", e);
                }
            }
        }

        match &options.name {
            Some(name) => bail!("no supported webcam named '{name}' found"),
            None => bail!("no supported webcam device found"),
        }
    }

    fn open_impl(dev: Device, options: &WebcamOptions) -> anyhow::Result<Option<Self>> {
        let caps = dev.capabilities()?;
        if let Some(name) = &options.name {
            if caps.card() != name.as_str() {
                return Ok(None);
            }
        }

        let cap_flags = caps.device_capabilities();
        let path = dev.path()?;
        log::debug!(
            "device {} ({}) capabilities: {:?}",
            caps.card(),
            path.display(),
            cap_flags,
        );

        if !cap_flags.contains(CapabilityFlags::VIDEO_CAPTURE) {
            return Ok(None);
        }

        let (pixfmt, fract) = negotiate_format(&dev, options)?;
        let capture = dev.video_capture(pixfmt)?;
        let format = capture.format();
        let resolution = Resolution::new(format.width(), format.height());
        let actual = capture.set_frame_interval(fract)?;

        log::info!(
            "opened {} ({}), {} @ {:.1}Hz",
            caps.card(),
            path.display(),
            resolution,
            1.0 / actual.as_f32(),
        );

        let stream = capture.into_stream(2)?;

        Ok(Some(Self {
            stream,
            name: caps.card().to_string(),
            resolution,
            last_frame: None,
            t_dequeue: Timer::new("dequeue"),
            t_decode: Timer::new("decode"),
        }))
    }

    /// Returns the device name of this webcam.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the resolution of the frames produced by this webcam.
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Reads the next frame from the camera.
    ///
    /// If no frame is available, this method will block until one is. An error indicates that
    /// the device is no longer usable.
    ///
    /// Frames that fail to decode are replaced with the previous frame (or a black frame, if
    /// there is none yet).
    pub fn read(&mut self) -> anyhow::Result<Image> {
        let dequeue_guard = self.t_dequeue.start();
        let decoded = self.stream.dequeue(|buf| {
            drop(dequeue_guard);
            Ok(self.t_decode.time(|| Image::decode_jpeg(&buf)))
        })?;

        let image = match decoded {
            Ok(image) => image,
            Err(e) => {
                // Even good webcams occasionally produce corrupted MJPG frames.
                log::warn!("webcam decode error: {e}");
                match &self.last_frame {
                    Some(last) => last.clone(),
                    None => Image::new(self.resolution.width(), self.resolution.height()),
                }
            }
        };
        self.last_frame = Some(image.clone());
        Ok(image)
    }

    /// Returns profiling timers for webcam access and decoding.
    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_dequeue, &self.t_decode].into_iter()
    }
}
