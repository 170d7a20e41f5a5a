//! Readiness flags of a detection session and the user controls acting on them.

use std::fmt;

/// Coarse state of a session, derived from its [`Session`] flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// The model or the camera is not ready yet; detection cannot be started.
    Idle,
    /// Model and camera are ready, detection is not running.
    Armed,
    /// Detection is running.
    Running,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            State::Idle => "idle",
            State::Armed => "armed",
            State::Running => "running",
        })
    }
}

/// A user action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Open the camera. Does nothing while the camera is opening or active.
    ActivateCamera,
    /// Begin or stop detection.
    ToggleDetection,
    Quit,
}

/// The readiness flags of the application.
///
/// Detection can only be active while both the model and the video are ready.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Session {
    model_ready: bool,
    video_ready: bool,
    detecting: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn model_ready(&self) -> bool {
        self.model_ready
    }

    #[inline]
    pub fn video_ready(&self) -> bool {
        self.video_ready
    }

    #[inline]
    pub fn detecting(&self) -> bool {
        self.detecting
    }

    pub fn state(&self) -> State {
        match (self.model_ready && self.video_ready, self.detecting) {
            (_, true) => State::Running,
            (true, false) => State::Armed,
            (false, false) => State::Idle,
        }
    }

    /// Returns whether the detection toggle is enabled.
    #[inline]
    pub fn can_toggle(&self) -> bool {
        self.model_ready && self.video_ready
    }

    pub fn set_model_ready(&mut self) {
        self.model_ready = true;
    }

    /// Updates the video flag. Losing the video also ends detection.
    pub fn set_video_ready(&mut self, ready: bool) {
        self.video_ready = ready;
        if !ready {
            self.detecting = false;
        }
    }

    /// Flips the detection flag and returns the new value.
    ///
    /// Returns `None` and changes nothing if the toggle is disabled.
    pub fn toggle(&mut self) -> Option<bool> {
        if !self.can_toggle() {
            return None;
        }
        self.detecting = !self.detecting;
        Some(self.detecting)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_requires_model_and_video() {
        for (model, video) in [(false, false), (true, false), (false, true), (true, true)] {
            let mut session = Session::new();
            if model {
                session.set_model_ready();
            }
            session.set_video_ready(video);
            assert_eq!(session.can_toggle(), model && video);

            let before = session;
            match session.toggle() {
                Some(active) => {
                    assert!(model && video);
                    assert!(active);
                    assert_eq!(session.state(), State::Running);
                }
                None => {
                    assert_eq!(session, before);
                    assert_eq!(session.state(), State::Idle);
                }
            }
        }
    }

    #[test]
    fn state_transitions() {
        let mut session = Session::new();
        assert_eq!(session.state(), State::Idle);
        session.set_video_ready(true);
        assert_eq!(session.state(), State::Idle);
        session.set_model_ready();
        assert_eq!(session.state(), State::Armed);
        assert_eq!(session.toggle(), Some(true));
        assert_eq!(session.state(), State::Running);
        assert_eq!(session.toggle(), Some(false));
        assert_eq!(session.state(), State::Armed);

        session.toggle();
        session.set_video_ready(false);
        assert!(!session.detecting());
        assert_eq!(session.state(), State::Idle);
    }
}
