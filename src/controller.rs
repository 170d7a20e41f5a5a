//! The detection loop.
//!
//! [`Controller`] decides when a detection request is dispatched, and draws the results of
//! completed requests through a [`Renderer`]. It does not run detection itself: the owner asks
//! [`Controller::poll_tick`] whether a request is due, runs the request however it likes, and
//! hands the result back via [`Controller::complete`].
//!
//! At most one request is in flight at any time. Ticks that come due while a request is still
//! running are skipped rather than queued. Each request is tagged with a sequence number, and a
//! completion is only drawn if it belongs to the current run of the detection loop.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use crate::{
    landmark::Detection,
    mesh::{self, TriangulationTable},
    session::{Session, State},
    sketch::Renderer,
    timer::{FpsCounter, Timer},
};

/// Summary of one applied detection result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Detections whose mesh was drawn.
    pub detections: usize,
    /// Detections that were not drawn because their keypoints did not fit the triangulation.
    pub skipped: usize,
    /// Total number of triangles drawn.
    pub triangles: usize,
}

/// What [`Controller::complete`] did with a detection result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The result was drawn.
    Applied(TickReport),
    /// The result belongs to an earlier run, or a newer result has already been drawn.
    Stale,
    /// Detection was stopped before the result arrived.
    Inactive,
}

pub struct Controller<R: Renderer> {
    session: Session,
    renderer: R,
    table: Arc<TriangulationTable>,
    interval: Duration,
    deadline: Option<Instant>,
    in_flight: Option<u64>,
    next_seq: u64,
    /// First sequence number dispatched in the current run.
    run_start: u64,
    last_applied: Option<u64>,
    t_draw: Timer,
    fps: FpsCounter,
}

impl<R: Renderer> Controller<R> {
    /// Creates a controller that draws via `renderer`, dispatching a request every `interval`
    /// while running.
    ///
    /// # Panics
    ///
    /// Panics if `interval` is zero.
    pub fn new(renderer: R, table: Arc<TriangulationTable>, interval: Duration) -> Self {
        assert!(!interval.is_zero(), "detection interval must be non-zero");
        Self {
            session: Session::new(),
            renderer,
            table,
            interval,
            deadline: None,
            in_flight: None,
            next_seq: 0,
            run_start: 0,
            last_applied: None,
            t_draw: Timer::new("draw"),
            fps: FpsCounter::new("detection"),
        }
    }

    #[inline]
    pub fn session(&self) -> &Session {
        &self.session
    }

    #[inline]
    pub fn state(&self) -> State {
        self.session.state()
    }

    #[inline]
    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    #[inline]
    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    #[inline]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns the point in time at which the next tick is due, if detection is running.
    #[inline]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns the sequence number of the request currently in flight.
    #[inline]
    pub fn in_flight(&self) -> Option<u64> {
        self.in_flight
    }

    pub fn model_ready(&mut self) {
        log::info!("model loaded");
        self.session.set_model_ready();
    }

    pub fn video_ready(&mut self) {
        log::info!("video activated");
        self.session.set_video_ready(true);
    }

    /// Marks the video as gone. If detection was running, it is stopped and the overlay cleared.
    pub fn video_lost(&mut self) {
        let was_running = self.session.detecting();
        self.session.set_video_ready(false);
        if was_running {
            log::warn!("video lost, stopping detection");
            self.stop();
        }
    }

    /// Begins or stops detection.
    ///
    /// Returns the new detection flag, or `None` if the toggle is currently disabled.
    pub fn toggle(&mut self, now: Instant) -> Option<bool> {
        let Some(active) = self.session.toggle() else {
            log::warn!("detection can only be toggled once the model and the video are ready");
            return None;
        };
        if active {
            log::info!("beginning detection every {:?}", self.interval);
            self.run_start = self.next_seq;
            self.renderer.clear();
            self.deadline = Some(now + self.interval);
        } else {
            log::info!("stopping detection");
            self.stop();
        }
        Some(active)
    }

    fn stop(&mut self) {
        self.deadline = None;
        self.renderer.clear();
    }

    /// Checks whether a tick is due at `now`.
    ///
    /// Returns the sequence number to tag the new request with, or `None` if no request should be
    /// dispatched. Ticks that come due while a request is in flight are skipped.
    pub fn poll_tick(&mut self, now: Instant) -> Option<u64> {
        let deadline = self.deadline?;
        if now < deadline {
            return None;
        }

        let mut next = deadline + self.interval;
        if next <= now {
            // Fell behind by more than one interval; don't try to catch up.
            next = now + self.interval;
        }
        self.deadline = Some(next);

        if let Some(seq) = self.in_flight {
            log::trace!("request #{seq} still in flight, skipping tick");
            return None;
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.in_flight = Some(seq);
        Some(seq)
    }

    /// Hands the result of request `seq` to the controller.
    ///
    /// Failed requests are treated as having found no faces.
    pub fn complete(&mut self, seq: u64, result: anyhow::Result<Vec<Detection>>) -> Completion {
        if self.in_flight == Some(seq) {
            self.in_flight = None;
        }

        if !self.session.detecting() {
            log::trace!("discarding result #{seq}, detection is stopped");
            return Completion::Inactive;
        }
        if seq < self.run_start || self.last_applied.map_or(false, |last| seq <= last) {
            log::trace!("discarding stale result #{seq}");
            return Completion::Stale;
        }
        self.last_applied = Some(seq);

        let detections = result.unwrap_or_else(|e| {
            log::warn!("detection failed: {e:#}");
            Vec::new()
        });

        let (renderer, table) = (&mut self.renderer, &*self.table);
        let report = self.t_draw.time(|| draw(renderer, table, &detections));
        log::trace!("#{seq}: {report:?}");
        self.fps.tick_with([&self.t_draw]);
        Completion::Applied(report)
    }
}

/// Clears the overlay and draws the mesh and bounding box of every detection.
fn draw<R: Renderer>(
    renderer: &mut R,
    table: &TriangulationTable,
    detections: &[Detection],
) -> TickReport {
    let mut report = TickReport::default();
    renderer.clear();
    for detection in detections {
        let triangles = match mesh::build_mesh(detection.keypoints(), table) {
            Ok(triangles) => triangles,
            Err(e) => {
                log::warn!("skipping detection: {e}");
                report.skipped += 1;
                continue;
            }
        };
        for triangle in &triangles {
            renderer.draw_polygon(triangle.points());
        }
        renderer.draw_rectangle(&detection.bounding_box());
        report.detections += 1;
        report.triangles += triangles.len();
    }
    report
}

#[cfg(test)]
mod tests {
    use crate::landmark::{BoundingBox, Keypoint, Point};

    use super::*;

    #[derive(Debug, PartialEq)]
    enum Op {
        Clear,
        Polygon(Vec<Point>),
        Rectangle(BoundingBox),
    }

    #[derive(Default)]
    struct Recorder(Vec<Op>);

    impl Renderer for Recorder {
        fn clear(&mut self) {
            self.0.push(Op::Clear);
        }

        fn draw_polygon(&mut self, points: &[Point]) {
            self.0.push(Op::Polygon(points.to_vec()));
        }

        fn draw_rectangle(&mut self, bbox: &BoundingBox) {
            self.0.push(Op::Rectangle(*bbox));
        }
    }

    const INTERVAL: Duration = Duration::from_millis(40);

    fn armed() -> (Controller<Recorder>, Instant) {
        let table = Arc::new(TriangulationTable::new(vec![0, 1, 2, 1, 2, 3]));
        let mut c = Controller::new(Recorder::default(), table, INTERVAL);
        c.model_ready();
        c.video_ready();
        (c, Instant::now())
    }

    fn square() -> Detection {
        Detection::new(
            vec![
                Keypoint::new(0.0, 0.0),
                Keypoint::new(1.0, 0.0),
                Keypoint::new(1.0, 1.0),
                Keypoint::new(0.0, 1.0),
            ],
            1.0,
        )
    }

    #[test]
    fn draws_triangles_then_bounding_box() {
        let (mut c, t0) = armed();
        c.toggle(t0);
        assert_eq!(c.poll_tick(t0), None);
        let seq = c.poll_tick(t0 + INTERVAL).unwrap();
        c.renderer_mut().0.clear();

        let report = c.complete(seq, Ok(vec![square()]));
        assert_eq!(
            report,
            Completion::Applied(TickReport {
                detections: 1,
                skipped: 0,
                triangles: 2,
            })
        );
        let p = |x, y| Point::new(x, y);
        assert_eq!(
            c.renderer().0,
            [
                Op::Clear,
                Op::Polygon(vec![p(0.0, 0.0), p(1.0, 0.0), p(1.0, 1.0)]),
                Op::Polygon(vec![p(1.0, 0.0), p(1.0, 1.0), p(0.0, 1.0)]),
                Op::Rectangle(square().bounding_box()),
            ]
        );
    }

    #[test]
    fn skips_ticks_while_in_flight() {
        let (mut c, t0) = armed();
        c.toggle(t0);
        let first = c.poll_tick(t0 + INTERVAL).unwrap();
        assert_eq!(c.poll_tick(t0 + INTERVAL * 2), None);
        assert_eq!(c.in_flight(), Some(first));

        c.complete(first, Ok(Vec::new()));
        assert_eq!(c.in_flight(), None);
        let second = c.poll_tick(t0 + INTERVAL * 3).unwrap();
        assert!(second > first);
    }

    #[test]
    fn deadline_does_not_catch_up() {
        let (mut c, t0) = armed();
        c.toggle(t0);
        let late = t0 + INTERVAL * 10;
        c.poll_tick(late).unwrap();
        assert_eq!(c.next_deadline(), Some(late + INTERVAL));
    }

    #[test]
    fn stop_clears_and_discards_late_results() {
        let (mut c, t0) = armed();
        c.toggle(t0);
        let seq = c.poll_tick(t0 + INTERVAL).unwrap();

        assert_eq!(c.toggle(t0 + INTERVAL), Some(false));
        assert_eq!(c.next_deadline(), None);
        assert_eq!(c.renderer().0.last(), Some(&Op::Clear));
        let ops = c.renderer().0.len();

        assert_eq!(c.complete(seq, Ok(vec![square()])), Completion::Inactive);
        assert_eq!(c.renderer().0.len(), ops);
        assert_eq!(c.poll_tick(t0 + INTERVAL * 5), None);
    }

    #[test]
    fn results_from_previous_run_are_stale() {
        let (mut c, t0) = armed();
        c.toggle(t0);
        let old = c.poll_tick(t0 + INTERVAL).unwrap();
        c.toggle(t0 + INTERVAL);
        c.toggle(t0 + INTERVAL);
        assert_eq!(c.renderer().0.last(), Some(&Op::Clear));

        // The old request still occupies the slot until it completes.
        assert_eq!(c.poll_tick(t0 + INTERVAL * 2), None);
        assert_eq!(c.complete(old, Ok(vec![square()])), Completion::Stale);
        assert!(!c.renderer().0.iter().any(|op| matches!(op, Op::Polygon(_))));

        let new = c.poll_tick(t0 + INTERVAL * 3).unwrap();
        assert!(matches!(c.complete(new, Ok(vec![square()])), Completion::Applied(_)));
    }

    #[test]
    fn failed_detection_clears_overlay() {
        let (mut c, t0) = armed();
        c.toggle(t0);
        let seq = c.poll_tick(t0 + INTERVAL).unwrap();
        c.renderer_mut().0.clear();
        let report = c.complete(seq, Err(anyhow::anyhow!("inference failed")));
        assert_eq!(report, Completion::Applied(TickReport::default()));
        assert_eq!(c.renderer().0, [Op::Clear]);
    }

    #[test]
    fn mesh_error_skips_only_that_detection() {
        let (mut c, t0) = armed();
        c.toggle(t0);
        let seq = c.poll_tick(t0 + INTERVAL).unwrap();
        let partial = Detection::new(vec![Keypoint::new(5.0, 5.0); 3], 1.0);
        let report = c.complete(seq, Ok(vec![partial, square()]));
        assert_eq!(
            report,
            Completion::Applied(TickReport {
                detections: 1,
                skipped: 1,
                triangles: 2,
            })
        );
        assert_eq!(
            c.renderer()
                .0
                .iter()
                .filter(|op| matches!(op, Op::Rectangle(_)))
                .count(),
            1
        );
    }

    #[test]
    fn toggle_is_rejected_until_ready() {
        let table = Arc::new(TriangulationTable::new(vec![0, 1, 2]));
        let mut c = Controller::new(Recorder::default(), table, INTERVAL);
        let now = Instant::now();
        assert_eq!(c.toggle(now), None);
        c.model_ready();
        assert_eq!(c.toggle(now), None);
        assert_eq!(c.state(), State::Idle);
        assert!(c.renderer().0.is_empty());
        assert_eq!(c.next_deadline(), None);
    }

    #[test]
    fn losing_video_stops_detection() {
        let (mut c, t0) = armed();
        c.toggle(t0);
        c.video_lost();
        assert_eq!(c.state(), State::Idle);
        assert_eq!(c.next_deadline(), None);
        assert_eq!(c.renderer().0.last(), Some(&Op::Clear));
        assert_eq!(c.toggle(t0), None);
    }
}
