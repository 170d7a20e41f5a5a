//! A single-window GUI that shows images and reports keyboard controls.
//!
//! The windowing event loop has to run on the main thread, so [`run`] takes over the calling
//! thread and moves the application onto a new one. The application then displays frames with
//! [`show_image`], and receives user input through the channel passed to [`run`].

mod renderer;

use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    process,
    sync::{Mutex, OnceLock},
    thread,
};

use crossbeam::channel::Sender;
use winit::{
    event::{ElementState, Event, KeyboardInput, VirtualKeyCode, WindowEvent},
    event_loop::{ControlFlow, EventLoop, EventLoopBuilder, EventLoopProxy},
};

use crate::{
    image::{Image, Resolution},
    session::Control,
};

use self::renderer::{Gpu, Renderer, Window};

#[derive(Debug)]
enum Msg {
    Image { res: Resolution, data: Vec<u8> },
}

static PROXY: OnceLock<Mutex<EventLoopProxy<Msg>>> = OnceLock::new();

/// Maps a pressed key to the control it triggers.
pub fn control_for_key(key: VirtualKeyCode) -> Option<Control> {
    match key {
        VirtualKeyCode::C => Some(Control::ActivateCamera),
        VirtualKeyCode::Space => Some(Control::ToggleDetection),
        VirtualKeyCode::Escape => Some(Control::Quit),
        _ => None,
    }
}

struct Gui<E> {
    gpu: Gpu,
    title: String,
    renderer: Option<Renderer>,
    controls: Sender<E>,
}

impl<E: From<Control> + Send + 'static> Gui<E> {
    fn run(mut self, event_loop: EventLoop<Msg>) -> ! {
        event_loop.run(move |event, target, flow| {
            *flow = ControlFlow::Wait;
            match event {
                Event::UserEvent(Msg::Image { res, data }) => {
                    if self.renderer.is_none() {
                        log::debug!("creating window '{}' at {res}", self.title);
                        let renderer = Window::open(target, &self.title, res)
                            .and_then(|win| Renderer::new(win, &self.gpu));
                        match renderer {
                            Ok(renderer) => self.renderer = Some(renderer),
                            Err(e) => {
                                log::error!("failed to open window: {e:#}");
                                *flow = ControlFlow::ExitWithCode(1);
                                return;
                            }
                        }
                    }
                    if let Some(renderer) = &mut self.renderer {
                        renderer.update_texture(&self.gpu, res, &data);
                        renderer.window().request_redraw();
                    }
                }
                Event::RedrawRequested(_) => {
                    if let Some(renderer) = &mut self.renderer {
                        renderer.redraw(&self.gpu);
                    }
                }
                Event::WindowEvent { event, .. } => {
                    let control = match event {
                        WindowEvent::CloseRequested => Some(Control::Quit),
                        WindowEvent::KeyboardInput {
                            input:
                                KeyboardInput {
                                    state: ElementState::Pressed,
                                    virtual_keycode: Some(key),
                                    ..
                                },
                            ..
                        } => control_for_key(key),
                        _ => None,
                    };
                    if let Some(control) = control {
                        log::trace!("control: {control:?}");
                        if self.controls.send(control.into()).is_err() {
                            log::debug!("application has exited, closing GUI");
                            *flow = ControlFlow::Exit;
                        }
                    }
                }
                _ => {}
            }
        });
    }
}

/// Runs the GUI on the calling thread, and `app` on a new thread.
///
/// Keyboard controls and window closure are sent to `controls` as [`Control`] values. The
/// process exits when `app` returns: with status 0 if it returned `Ok`, 1 if it returned an
/// error, and 101 if it panicked.
///
/// This function only returns if the GPU could not be initialized.
pub fn run<E, F>(title: &str, controls: Sender<E>, app: F) -> anyhow::Result<()>
where
    E: From<Control> + Send + 'static,
    F: FnOnce() -> anyhow::Result<()> + Send + 'static,
{
    let gpu = pollster::block_on(Gpu::open())?;
    let event_loop = EventLoopBuilder::with_user_event().build();
    if PROXY
        .set(Mutex::new(event_loop.create_proxy()))
        .is_err()
    {
        anyhow::bail!("GUI is already running");
    }

    thread::Builder::new()
        .name("app".into())
        .spawn(move || match catch_unwind(AssertUnwindSafe(app)) {
            Ok(Ok(())) => process::exit(0),
            Ok(Err(e)) => {
                log::error!("{e:#}");
                eprintln!("Error: {e:?}");
                process::exit(1);
            }
            // The panic hook has printed the message already.
            Err(_payload) => process::exit(101),
        })?;

    let gui = Gui {
        gpu,
        title: title.to_string(),
        renderer: None,
        controls,
    };
    gui.run(event_loop);
}

/// Displays an image in the window, opening it on first use.
///
/// Does nothing if the GUI is not running.
pub fn show_image(image: &Image) {
    let Some(proxy) = PROXY.get() else {
        log::warn!("`show_image` called without a running GUI");
        return;
    };
    // Image data is RGBA8 internally so that no conversion before GPU upload is needed.
    let msg = Msg::Image {
        res: image.resolution(),
        data: image.data().to_vec(),
    };
    let proxy = proxy.lock().unwrap_or_else(|poison| poison.into_inner());
    if proxy.send_event(msg).is_err() {
        log::debug!("GUI event loop has exited, dropping image");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_bindings() {
        assert_eq!(
            control_for_key(VirtualKeyCode::C),
            Some(Control::ActivateCamera)
        );
        assert_eq!(
            control_for_key(VirtualKeyCode::Space),
            Some(Control::ToggleDetection)
        );
        assert_eq!(control_for_key(VirtualKeyCode::Escape), Some(Control::Quit));
        assert_eq!(control_for_key(VirtualKeyCode::A), None);
    }
}
