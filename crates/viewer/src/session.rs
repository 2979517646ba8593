//! Viewer session - turns server events into graph updates
//!
//! On `welcome` the session asks for the page right before the announced
//! index and keeps a cursor for further "load more" requests. Pages are
//! disjoint: each request is made at the cursor, then the cursor moves back
//! by one page.

use crate::{format::format_magnitude, reconciler::GraphReconciler, render::Renderer};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use tangle_core::{ServerEvent, StatsWindow, Tip, ViewerRequest, HISTORY_PAGE_SIZE};

/// Tips logged from each `tips` message
const LOG_TIPS_PER_MESSAGE: usize = 5;
/// Lines kept in the activity log
const LOG_CAPACITY: usize = 6;

/// One line of the activity log
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityEntry {
    pub at: DateTime<Utc>,
    pub hash: String,
    pub value: f64,
}

impl ActivityEntry {
    pub fn valued(&self) -> bool {
        self.value > 0.0
    }

    /// `<formatted value> <hash>`
    pub fn line(&self) -> String {
        format!("{} {}", format_magnitude(self.value, ""), self.hash)
    }
}

/// Ring of the most recent tips
#[derive(Debug, Default)]
pub struct ActivityLog {
    entries: VecDeque<ActivityEntry>,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, tip: &Tip) {
        if self.entries.len() == LOG_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(ActivityEntry {
            at: Utc::now(),
            hash: tip.h.clone(),
            value: tip.v,
        });
    }

    pub fn entries(&self) -> impl Iterator<Item = &ActivityEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Client-side state of one viewer connection
pub struct ViewerSession<R: Renderer> {
    graph: GraphReconciler<R>,
    stats: Option<StatsWindow>,
    /// Index the next "load more" request is made at
    cursor: u64,
    activity: Option<ActivityLog>,
}

impl<R: Renderer> ViewerSession<R> {
    pub fn new(renderer: R) -> Self {
        Self {
            graph: GraphReconciler::new(renderer),
            stats: None,
            cursor: 0,
            activity: None,
        }
    }

    /// Keep a log of the first few tips of every batch
    pub fn with_activity_log(mut self, enabled: bool) -> Self {
        self.activity = enabled.then(ActivityLog::new);
        self
    }

    /// Apply a server event. Returns the request to send back, if any.
    pub fn handle_event(&mut self, event: ServerEvent) -> Option<ViewerRequest> {
        match event {
            ServerEvent::Welcome(window) => {
                self.stats = Some(window);
                self.cursor = window.index.saturating_sub(HISTORY_PAGE_SIZE as u64);
                return Some(ViewerRequest::History(window.index));
            }
            ServerEvent::Stats(window) => {
                self.stats = Some(window);
            }
            ServerEvent::Tips(payload) => {
                if let Some(log) = self.activity.as_mut() {
                    for tip in payload.tips.iter().take(LOG_TIPS_PER_MESSAGE) {
                        log.record(tip);
                    }
                }
                self.graph.add_tips(&payload.tips);
            }
            ServerEvent::Tip(payload) => {
                self.graph.add_tip(&payload.tip.hashes);
            }
        }
        None
    }

    /// More history exists before the cursor
    pub fn can_load_more(&self) -> bool {
        self.cursor > HISTORY_PAGE_SIZE as u64
    }

    /// Request the page before the cursor and move it back
    pub fn load_more(&mut self) -> Option<ViewerRequest> {
        if !self.can_load_more() {
            return None;
        }
        let request = ViewerRequest::History(self.cursor);
        self.cursor -= HISTORY_PAGE_SIZE as u64;
        Some(request)
    }

    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn stats(&self) -> Option<&StatsWindow> {
        self.stats.as_ref()
    }

    pub fn graph(&self) -> &GraphReconciler<R> {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut GraphReconciler<R> {
        &mut self.graph
    }

    pub fn activity(&self) -> Option<&ActivityLog> {
        self.activity.as_ref()
    }

    /// One-line status: throughput, value flow, milestone and graph size
    pub fn summary(&self) -> String {
        let stats = self.stats.unwrap_or_default();
        format!(
            "{} t/m  {}/m  #{} milestone  {} transactions",
            stats.tpm,
            format_magnitude(stats.ipm, " "),
            stats.milestone,
            self.graph.node_count()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::HeadlessRenderer;

    fn session() -> ViewerSession<HeadlessRenderer> {
        ViewerSession::new(HeadlessRenderer::new())
    }

    fn tips(range: std::ops::Range<u64>) -> ServerEvent {
        ServerEvent::tips(
            range
                .map(|i| Tip {
                    v: (i % 3) as f64,
                    h: format!("H{}", i),
                    t: "T".to_string(),
                    b: "B".to_string(),
                })
                .collect(),
        )
    }

    fn welcome(index: u64) -> ServerEvent {
        ServerEvent::Welcome(StatsWindow {
            index,
            ..StatsWindow::default()
        })
    }

    #[test]
    fn test_welcome_requests_latest_page() {
        let mut session = session();
        assert_eq!(
            session.handle_event(welcome(300)),
            Some(ViewerRequest::History(300))
        );
        assert_eq!(session.cursor(), 200);
        assert_eq!(session.stats().map(|s| s.index), Some(300));
    }

    #[test]
    fn test_load_more_pages_are_disjoint() {
        let mut session = session();
        session.handle_event(welcome(350));

        assert_eq!(session.load_more(), Some(ViewerRequest::History(250)));
        assert_eq!(session.load_more(), Some(ViewerRequest::History(150)));
        // Load more stops once less than a full page remains
        assert!(!session.can_load_more());
        assert_eq!(session.load_more(), None);
    }

    #[test]
    fn test_small_history() {
        let mut session = session();
        assert_eq!(
            session.handle_event(welcome(40)),
            Some(ViewerRequest::History(40))
        );
        assert_eq!(session.cursor(), 0);
        assert!(!session.can_load_more());
    }

    #[test]
    fn test_stats_and_tips() {
        let mut session = session();
        session.handle_event(welcome(0));
        assert_eq!(session.handle_event(tips(0..4)), None);
        session.handle_event(ServerEvent::Stats(StatsWindow {
            tpm: 12,
            ipm: 2500.0,
            milestone: 9,
            ..StatsWindow::default()
        }));
        session.handle_event(ServerEvent::legacy_tip(Tip {
            v: 0.0,
            h: "L".to_string(),
            t: "T".to_string(),
            b: "B".to_string(),
        }));

        assert_eq!(session.graph().node_count(), 7);
        assert_eq!(
            session.summary(),
            "12 t/m  2.5 KI/m  #9 milestone  7 transactions"
        );
        assert!(session.activity().is_none());
    }

    #[test]
    fn test_activity_log_ring() {
        let mut session = session().with_activity_log(true);
        session.handle_event(tips(0..10));
        session.handle_event(tips(10..12));

        let log = session.activity().unwrap();
        assert_eq!(log.len(), 6);
        let lines: Vec<String> = log.entries().map(ActivityEntry::line).collect();
        assert_eq!(lines[0], "1I H1");
        assert_eq!(lines[4], "1I H10");
        assert_eq!(lines[5], "2I H11");
        assert!(!log.entries().nth(2).unwrap().valued());
    }
}
