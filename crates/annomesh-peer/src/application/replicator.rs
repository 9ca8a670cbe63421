//! AnnotationReplicator: the element stores and the messages that keep them
//! in sync.
//!
//! Two stores are kept apart:
//!
//! - **local history** – elements this participant drew, in local pixels,
//!   with an undo/redo cursor;
//! - **peer-origin list** – elements received from others, kept in wire
//!   (normalized) coordinates and denormalized against the current canvas
//!   frame whenever they are read.
//!
//! Local operations mutate the local store and, while collaborating, queue
//! the matching outbound [`MessageBody`] in an outbox the session drains
//! with [`take_outbound`](AnnotationReplicator::take_outbound).  Inbound
//! messages go through [`apply_inbound`](AnnotationReplicator::apply_inbound).

use std::collections::BTreeMap;

use annomesh_core::protocol::ElementIdGenerator;
use annomesh_core::{
    AnnotationElement, CanvasSpace, ElementId, ElementPatch, Frame, History, MessageBody, PeerId,
    Point, SelectionSet, Style, Tool,
};
use tracing::{debug, trace};

/// Result of applying one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundOutcome {
    /// The element stores changed.
    Applied,
    /// The message referenced an element nobody here knows about.
    Stale,
    /// Not an annotation message; nothing was touched.
    NotAnnotation,
}

/// Where a group is inserted once its members are removed.
enum Anchor {
    Local(ElementId),
    Remote(usize),
}

pub struct AnnotationReplicator {
    space: CanvasSpace,
    local_peer: PeerId,
    ids: ElementIdGenerator,
    history: History,
    /// Peer-origin elements, wire coordinates.
    remote: Vec<AnnotationElement>,
    pointers: BTreeMap<PeerId, Point>,
    collaborating: bool,
    outbound: Vec<MessageBody>,
}

impl AnnotationReplicator {
    pub fn new(space: CanvasSpace) -> Self {
        Self {
            space,
            local_peer: PeerId::new(),
            ids: ElementIdGenerator::new(),
            history: History::new(),
            remote: Vec::new(),
            pointers: BTreeMap::new(),
            collaborating: false,
            outbound: Vec::new(),
        }
    }

    /// Sets the peer id stamped into new element ids.
    pub fn set_local_peer(&mut self, peer: impl Into<PeerId>) {
        self.local_peer = peer.into();
    }

    /// While collaborating, local operations queue outbound messages.
    pub fn set_collaborating(&mut self, collaborating: bool) {
        self.collaborating = collaborating;
        if !collaborating {
            self.outbound.clear();
        }
    }

    pub fn is_collaborating(&self) -> bool {
        self.collaborating
    }

    pub fn canvas(&self) -> CanvasSpace {
        self.space
    }

    /// Updates the frame coordinates are measured against (window resize).
    pub fn set_canvas_frame(&mut self, frame: Frame) {
        self.space = self.space.with_frame(frame);
    }

    // ── Reads ────────────────────────────────────────────────────────────────

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Visible local elements, local pixels.
    pub fn local_elements(&self) -> &[AnnotationElement] {
        self.history.visible()
    }

    /// Peer-origin elements, denormalized against the current frame.
    pub fn peer_elements(&self) -> Vec<AnnotationElement> {
        self.remote.iter().map(|e| self.from_wire(e)).collect()
    }

    /// Everything on the canvas, local first, local pixels.
    pub fn all_elements(&self) -> Vec<AnnotationElement> {
        let mut all = self.history.visible().to_vec();
        all.extend(self.peer_elements());
        all
    }

    /// Looks an element up in either store, local pixels.
    pub fn element(&self, id: &str) -> Option<AnnotationElement> {
        self.history
            .get(id)
            .cloned()
            .or_else(|| self.remote.iter().find(|e| e.id == id).map(|e| self.from_wire(e)))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.history.contains(id) || self.remote.iter().any(|e| e.id == id)
    }

    /// Last known pointer position of each remote peer, local pixels.
    pub fn remote_pointers(&self) -> impl Iterator<Item = (&PeerId, &Point)> {
        self.pointers.iter()
    }

    // ── Local operations ─────────────────────────────────────────────────────

    /// Starts a new element at `at` and returns its id.
    pub fn begin_element(&mut self, tool: Tool, style: Style, at: Point) -> ElementId {
        let id = self.ids.next_id(&self.local_peer);
        let element = AnnotationElement::begin(id.clone(), tool, style, at);
        let wire = self.space.to_wire(at);
        self.queue(MessageBody::AnnotationStart {
            id: id.clone(),
            tool,
            color: element.style.color.clone(),
            fill_color: element.style.fill_color.clone(),
            filled: Some(element.style.filled),
            width: element.style.width,
            x: wire.x,
            y: wire.y,
        });
        self.history.push(element);
        id
    }

    /// Extends an active element.  Returns `false` if `id` is not an active
    /// local element.
    pub fn extend_element(&mut self, id: &str, point: Point) -> bool {
        let Some(element) = self.history.get_mut(id).filter(|e| e.is_active) else {
            return false;
        };
        element.extend(point);
        let tool = element.tool;
        let wire = self.space.to_wire(point);
        self.queue(MessageBody::AnnotationMove {
            id: id.to_string(),
            tool,
            x: wire.x,
            y: wire.y,
        });
        true
    }

    pub fn end_element(&mut self, id: &str) -> bool {
        let Some(element) = self.history.get_mut(id).filter(|e| e.is_active) else {
            return false;
        };
        element.is_active = false;
        self.queue(MessageBody::AnnotationEnd { id: id.to_string() });
        true
    }

    /// Inserts a finished element (text, sticker) in one step.  An empty id
    /// is replaced with a fresh one.
    pub fn add_element(&mut self, mut element: AnnotationElement) -> ElementId {
        if element.id.is_empty() {
            element.id = self.ids.next_id(&self.local_peer);
        }
        element.is_active = false;
        let id = element.id.clone();
        self.queue(MessageBody::AnnotationElement {
            element: self.to_wire(&element),
        });
        self.history.push(element);
        id
    }

    /// Applies `patch` (local pixels) to the element in whichever store holds
    /// it.  Only fields that actually changed are sent.
    pub fn update_element(&mut self, id: &str, patch: &ElementPatch) -> bool {
        let space = self.space;
        let diff = if let Some(element) = self.history.get_mut(id) {
            let before = element.clone();
            element.apply_patch(patch);
            ElementPatch::diff(&before, element).map_points(|p| space.to_wire(p))
        } else if let Some(element) = self.remote.iter_mut().find(|e| e.id == id) {
            let before = element.clone();
            element.apply_patch(&patch.map_points(|p| space.to_wire(p)));
            ElementPatch::diff(&before, element)
        } else {
            return false;
        };
        if !diff.is_empty() {
            self.queue(MessageBody::ElementUpdate {
                id: id.to_string(),
                element: diff,
            });
        }
        true
    }

    pub fn delete_element(&mut self, id: &str) -> bool {
        let removed = self.history.remove(id).is_some() || self.remove_remote(id);
        if removed {
            self.queue(MessageBody::ElementDelete { id: id.to_string() });
        }
        removed
    }

    /// Hides the most recent local element.  Peers delete it.
    pub fn undo(&mut self) -> Option<ElementId> {
        let id = self.history.undo()?.id.clone();
        self.queue(MessageBody::ElementDelete { id: id.clone() });
        Some(id)
    }

    /// Restores the next element of the redo tail.  Peers receive it whole.
    pub fn redo(&mut self) -> Option<ElementId> {
        let element = self.history.redo()?.clone();
        let id = element.id.clone();
        self.queue(MessageBody::AnnotationElement {
            element: self.to_wire(&element),
        });
        Some(id)
    }

    /// Wipes both stores for every participant.
    pub fn clear(&mut self) {
        self.history.clear();
        self.remote.clear();
        self.queue(MessageBody::AnnotationClear);
    }

    /// Groups `ids` into a new group element and returns its id.
    ///
    /// `None` if none of the ids exist or none has geometry.
    pub fn group(&mut self, ids: &[ElementId]) -> Option<ElementId> {
        let group_id = self.ids.next_id(&self.local_peer);
        let group = self.place_group(&group_id, ids, None)?;
        let element_ids = group.children.iter().map(|c| c.id.clone()).collect();
        self.queue(MessageBody::GroupCreate {
            group_id: group_id.clone(),
            element_ids,
            children: Some(group.children),
        });
        Some(group_id)
    }

    /// Groups the selection and selects the new group.
    pub fn group_selection(&mut self, selection: &mut SelectionSet) -> Option<ElementId> {
        let ids: Vec<ElementId> = selection.ids().cloned().collect();
        let group_id = self.group(&ids)?;
        selection.select_only(group_id.clone());
        Some(group_id)
    }

    /// Replaces a group with its members at their derived absolute positions.
    pub fn ungroup(&mut self, group_id: &str) -> bool {
        let Some(members) = self.place_members(group_id, None) else {
            return false;
        };
        self.queue(MessageBody::GroupUngroup {
            group_id: group_id.to_string(),
            element_ids: members.iter().map(|m| m.id.clone()).collect(),
            children: Some(members),
        });
        true
    }

    /// Queues our pointer position for the other participants.
    pub fn move_pointer(&mut self, at: Point) {
        let wire = self.space.to_wire(at);
        self.queue(MessageBody::PointerMove {
            nx: wire.x,
            ny: wire.y,
        });
    }

    /// Records a remote pointer and returns it in local pixels.
    pub fn record_pointer(&mut self, peer: &str, nx: f64, ny: f64) -> Point {
        let at = self.space.from_wire(Point::new(nx, ny));
        self.pointers.insert(peer.to_string(), at);
        at
    }

    // ── Session helpers ──────────────────────────────────────────────────────

    /// Full state as the host sends it: visible local history followed by
    /// the peer-origin list, normalized, plus the count of host elements.
    pub fn full_sync_snapshot(&self) -> MessageBody {
        let mut elements: Vec<_> = self
            .history
            .visible()
            .iter()
            .map(|e| self.to_wire(e))
            .collect();
        let history_step = elements.len();
        elements.extend(self.remote.iter().cloned());
        MessageBody::AnnotationSync {
            elements,
            history_step,
        }
    }

    /// Drains queued outbound messages.
    pub fn take_outbound(&mut self) -> Vec<MessageBody> {
        std::mem::take(&mut self.outbound)
    }

    /// Drops per-peer ephemeral state when `peer` leaves.
    pub fn forget_peer(&mut self, peer: &str) {
        self.pointers.remove(peer);
    }

    /// Drops everything received from others.  Local history is kept.
    pub fn reset_remote(&mut self) {
        self.remote.clear();
        self.pointers.clear();
        self.outbound.clear();
        self.collaborating = false;
    }

    // ── Inbound ──────────────────────────────────────────────────────────────

    /// Applies an annotation message received from `origin`.
    pub fn apply_inbound(&mut self, origin: &str, body: &MessageBody) -> InboundOutcome {
        match body {
            MessageBody::AnnotationStart {
                id,
                tool,
                color,
                fill_color,
                filled,
                width,
                x,
                y,
            } => {
                if self.contains(id) {
                    trace!(%origin, %id, "duplicate start ignored");
                    return InboundOutcome::Stale;
                }
                let style = Style {
                    color: color.clone(),
                    width: *width,
                    fill_color: fill_color.clone(),
                    filled: filled.unwrap_or(false),
                };
                self.remote.push(AnnotationElement::begin(
                    id.clone(),
                    *tool,
                    style,
                    Point::new(*x, *y),
                ));
                InboundOutcome::Applied
            }
            MessageBody::AnnotationMove { id, x, y, .. } => match self.remote_mut(id) {
                Some(element) => {
                    element.extend(Point::new(*x, *y));
                    InboundOutcome::Applied
                }
                None => stale(origin, id),
            },
            MessageBody::AnnotationEnd { id } => match self.remote_mut(id) {
                Some(element) => {
                    element.is_active = false;
                    InboundOutcome::Applied
                }
                None => stale(origin, id),
            },
            MessageBody::AnnotationElement { element } => {
                if self.history.contains(&element.id) {
                    let local = self.from_wire(element);
                    self.history.replace(&element.id, local);
                } else if let Some(slot) = self.remote_mut(&element.id) {
                    *slot = element.clone();
                } else {
                    self.remote.push(element.clone());
                }
                InboundOutcome::Applied
            }
            MessageBody::ElementUpdate { id, element: patch } => {
                let space = self.space;
                if let Some(element) = self.remote_mut(id) {
                    element.apply_patch(patch);
                } else if let Some(element) = self.history.get_mut(id) {
                    element.apply_patch(&patch.map_points(|p| space.from_wire(p)));
                } else {
                    return stale(origin, id);
                }
                InboundOutcome::Applied
            }
            MessageBody::ElementDelete { id } => {
                if self.remove_remote(id) || self.history.remove(id).is_some() {
                    InboundOutcome::Applied
                } else {
                    stale(origin, id)
                }
            }
            MessageBody::AnnotationClear => {
                debug!(%origin, "canvas cleared remotely");
                self.history.clear();
                self.remote.clear();
                InboundOutcome::Applied
            }
            MessageBody::AnnotationSync {
                elements,
                history_step,
            } => {
                let incoming: Vec<_> = elements
                    .iter()
                    .filter(|e| !self.history.contains(&e.id))
                    .cloned()
                    .collect();
                debug!(%origin, count = incoming.len(), history_step, "full sync applied");
                self.remote = incoming;
                InboundOutcome::Applied
            }
            MessageBody::GroupCreate {
                group_id,
                element_ids,
                children,
            } => {
                if self.contains(group_id) {
                    return InboundOutcome::Stale;
                }
                match self.place_group(group_id, element_ids, children.clone()) {
                    Some(_) => InboundOutcome::Applied,
                    None => stale(origin, group_id),
                }
            }
            MessageBody::GroupUngroup {
                group_id, children, ..
            } => match self.place_members(group_id, children.clone()) {
                Some(_) => InboundOutcome::Applied,
                None => stale(origin, group_id),
            },
            MessageBody::SyncRequest
            | MessageBody::PointerMove { .. }
            | MessageBody::ChatMessage { .. }
            | MessageBody::ChatReaction { .. }
            | MessageBody::PeerJoined { .. }
            | MessageBody::PeerLeft { .. }
            | MessageBody::MediaState { .. } => InboundOutcome::NotAnnotation,
        }
    }

    // ── Internals ────────────────────────────────────────────────────────────

    fn queue(&mut self, body: MessageBody) {
        if self.collaborating {
            self.outbound.push(body);
        }
    }

    fn to_wire(&self, element: &AnnotationElement) -> AnnotationElement {
        element.map_points(|p| self.space.to_wire(p))
    }

    fn from_wire(&self, element: &AnnotationElement) -> AnnotationElement {
        element.map_points(|p| self.space.from_wire(p))
    }

    fn remote_mut(&mut self, id: &str) -> Option<&mut AnnotationElement> {
        self.remote.iter_mut().find(|e| e.id == id)
    }

    fn remove_remote(&mut self, id: &str) -> bool {
        match self.remote.iter().position(|e| e.id == id) {
            Some(index) => {
                self.remote.remove(index);
                true
            }
            None => false,
        }
    }

    /// Builds a group from `ids` (found in either store) and puts it where
    /// the first member was.  If any member is local the group joins local
    /// history, otherwise the peer-origin list.  Returns the group in wire
    /// coordinates.
    fn place_group(
        &mut self,
        group_id: &str,
        ids: &[ElementId],
        children: Option<Vec<AnnotationElement>>,
    ) -> Option<AnnotationElement> {
        let mut members = Vec::new();
        let mut local_anchor = None;
        let mut remote_anchor = None;
        for id in ids {
            if let Some(index) = self.remote.iter().position(|e| &e.id == id) {
                members.push(self.remote[index].clone());
                remote_anchor = Some(remote_anchor.map_or(index, |a: usize| a.min(index)));
            } else if let Some(element) = self.history.get(id) {
                members.push(self.to_wire(element));
                local_anchor.get_or_insert_with(|| id.clone());
            }
        }
        let mut group = AnnotationElement::group(group_id, members)?;
        if let Some(children) = children {
            group.children = children;
        }

        let anchor = match (local_anchor, remote_anchor) {
            (Some(id), _) => Anchor::Local(id),
            (None, Some(index)) => Anchor::Remote(index),
            (None, None) => return None,
        };
        for id in ids {
            self.remove_remote(id);
            if !matches!(&anchor, Anchor::Local(a) if a == id) {
                self.history.remove(id);
            }
        }
        match anchor {
            Anchor::Local(id) => {
                let local = self.from_wire(&group);
                self.history.splice(&id, vec![local]);
            }
            Anchor::Remote(index) => {
                let index = index.min(self.remote.len());
                self.remote.insert(index, group.clone());
            }
        }
        Some(group)
    }

    /// Replaces group `group_id` with its members.  `members` (wire
    /// coordinates, absolute) overrides the members derived from the box.
    /// Returns the members in wire coordinates.
    fn place_members(
        &mut self,
        group_id: &str,
        members: Option<Vec<AnnotationElement>>,
    ) -> Option<Vec<AnnotationElement>> {
        if let Some(index) = self
            .remote
            .iter()
            .position(|e| e.id == group_id && e.tool == Tool::Group)
        {
            let members = members.unwrap_or_else(|| self.remote[index].group_members());
            self.remote.splice(index..=index, members.iter().cloned());
            return Some(members);
        }

        let group = self.history.get(group_id).filter(|g| g.tool == Tool::Group)?;
        let (local, wire): (Vec<_>, Vec<_>) = match members {
            Some(wire) => (wire.iter().map(|m| self.from_wire(m)).collect(), wire),
            None => {
                let local = group.group_members();
                let wire = local.iter().map(|m| self.to_wire(m)).collect();
                (local, wire)
            }
        };
        self.history.splice(group_id, local);
        Some(wire)
    }
}

fn stale(origin: &str, id: &str) -> InboundOutcome {
    trace!(%origin, %id, "message for unknown element dropped");
    InboundOutcome::Stale
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(w: f64, h: f64) -> Frame {
        Frame::new(w, h).unwrap()
    }

    fn replicator(peer: &str, w: f64, h: f64) -> AnnotationReplicator {
        let mut r = AnnotationReplicator::new(CanvasSpace::Viewport(frame(w, h)));
        r.set_local_peer(peer);
        r.set_collaborating(true);
        r
    }

    fn close(a: Point, b: Point) -> bool {
        (a.x - b.x).abs() < 1e-6 && (a.y - b.y).abs() < 1e-6
    }

    fn draw_rect(r: &mut AnnotationReplicator, from: Point, to: Point) -> ElementId {
        let id = r.begin_element(Tool::Rect, Style::default(), from);
        r.extend_element(&id, to);
        r.end_element(&id);
        id
    }

    /// Feeds everything `from` queued into `to`.
    fn pump(from: &mut AnnotationReplicator, to: &mut AnnotationReplicator) {
        for body in from.take_outbound() {
            to.apply_inbound(&from.local_peer, &body);
        }
    }

    #[test]
    fn test_begin_queues_normalized_start() {
        // Arrange
        let mut r = replicator("me", 1000.0, 500.0);

        // Act
        r.begin_element(Tool::Pencil, Style::default(), Point::new(500.0, 250.0));

        // Assert
        let out = r.take_outbound();
        assert!(matches!(
            out.as_slice(),
            [MessageBody::AnnotationStart { x, y, .. }] if (*x - 0.5).abs() < 1e-9 && (*y - 0.5).abs() < 1e-9
        ));
    }

    #[test]
    fn test_nothing_queued_while_solo() {
        let mut r = replicator("me", 100.0, 100.0);
        r.set_collaborating(false);
        draw_rect(&mut r, Point::new(1.0, 1.0), Point::new(2.0, 2.0));
        assert!(r.take_outbound().is_empty());
        assert_eq!(r.local_elements().len(), 1);
    }

    #[test]
    fn test_stroke_replicates_across_different_frames() {
        // Arrange
        let mut host = replicator("a", 1920.0, 1080.0);
        let mut joiner = replicator("b", 1280.0, 720.0);

        // Act
        let id = host.begin_element(Tool::Pencil, Style::default(), Point::new(960.0, 540.0));
        host.extend_element(&id, Point::new(1920.0 * 0.25, 1080.0 * 0.75));
        host.end_element(&id);
        pump(&mut host, &mut joiner);

        // Assert
        let seen = joiner.peer_elements();
        assert_eq!(seen.len(), 1);
        assert!(!seen[0].is_active);
        assert!(close(seen[0].points[0], Point::new(640.0, 360.0)));
        assert!(close(seen[0].points[1], Point::new(320.0, 540.0)));
    }

    #[test]
    fn test_update_sends_only_changed_fields() {
        // Arrange
        let mut r = replicator("me", 100.0, 100.0);
        let id = draw_rect(&mut r, Point::new(10.0, 10.0), Point::new(20.0, 20.0));
        r.take_outbound();

        // Act
        r.update_element(
            &id,
            &ElementPatch {
                end: Some(Point::new(50.0, 50.0)),
                color: Some("#000000".into()),
                ..Default::default()
            },
        );

        // Assert
        let out = r.take_outbound();
        let MessageBody::ElementUpdate { element, .. } = &out[0] else {
            panic!("expected ELEMENT_UPDATE, got {out:?}");
        };
        assert_eq!(element.end, Some(Point::new(0.5, 0.5)));
        assert_eq!(element.color, None);
        assert_eq!(element.start, None);
    }

    #[test]
    fn test_unchanged_update_sends_nothing() {
        let mut r = replicator("me", 100.0, 100.0);
        let id = draw_rect(&mut r, Point::new(10.0, 10.0), Point::new(20.0, 20.0));
        r.take_outbound();
        assert!(r.update_element(&id, &ElementPatch::default()));
        assert!(r.take_outbound().is_empty());
    }

    #[test]
    fn test_remote_update_of_local_element_keeps_cursor() {
        // Arrange
        let mut r = replicator("me", 100.0, 100.0);
        let id = draw_rect(&mut r, Point::new(10.0, 10.0), Point::new(20.0, 20.0));
        let step = r.history().step();

        // Act
        let outcome = r.apply_inbound(
            "peer",
            &MessageBody::ElementUpdate {
                id: id.clone(),
                element: ElementPatch {
                    rotation: Some(1.5),
                    end: Some(Point::new(0.9, 0.9)),
                    ..Default::default()
                },
            },
        );

        // Assert
        assert_eq!(outcome, InboundOutcome::Applied);
        assert_eq!(r.history().step(), step);
        let e = r.element(&id).unwrap();
        assert_eq!(e.rotation, 1.5);
        assert!(close(e.end.unwrap(), Point::new(90.0, 90.0)));
    }

    #[test]
    fn test_unknown_references_are_stale() {
        let mut r = replicator("me", 100.0, 100.0);
        for body in [
            MessageBody::AnnotationMove {
                id: "ghost".into(),
                tool: Tool::Pencil,
                x: 0.1,
                y: 0.1,
            },
            MessageBody::AnnotationEnd { id: "ghost".into() },
            MessageBody::ElementDelete { id: "ghost".into() },
            MessageBody::ElementUpdate {
                id: "ghost".into(),
                element: ElementPatch::default(),
            },
        ] {
            assert_eq!(r.apply_inbound("p", &body), InboundOutcome::Stale);
        }
        assert!(r.all_elements().is_empty());
    }

    #[test]
    fn test_undo_and_redo_replicate() {
        // Arrange
        let mut a = replicator("a", 100.0, 100.0);
        let mut b = replicator("b", 100.0, 100.0);
        draw_rect(&mut a, Point::new(1.0, 1.0), Point::new(5.0, 5.0));
        pump(&mut a, &mut b);

        // Act / Assert
        a.undo();
        pump(&mut a, &mut b);
        assert!(b.peer_elements().is_empty());

        a.redo();
        pump(&mut a, &mut b);
        assert_eq!(b.peer_elements().len(), 1);
        assert!(!b.peer_elements()[0].is_active);
    }

    #[test]
    fn test_new_edit_after_undo_truncates_redo_tail() {
        let mut r = replicator("me", 100.0, 100.0);
        draw_rect(&mut r, Point::new(1.0, 1.0), Point::new(2.0, 2.0));
        draw_rect(&mut r, Point::new(3.0, 3.0), Point::new(4.0, 4.0));
        r.undo();
        draw_rect(&mut r, Point::new(5.0, 5.0), Point::new(6.0, 6.0));
        assert_eq!(r.history().len(), 2);
        assert!(r.redo().is_none());
    }

    #[test]
    fn test_remote_clear_wipes_both_stores() {
        // Arrange
        let mut a = replicator("a", 100.0, 100.0);
        let mut b = replicator("b", 100.0, 100.0);
        draw_rect(&mut a, Point::new(1.0, 1.0), Point::new(2.0, 2.0));
        draw_rect(&mut b, Point::new(1.0, 1.0), Point::new(2.0, 2.0));
        pump(&mut a, &mut b);

        // Act
        a.clear();
        pump(&mut a, &mut b);

        // Assert
        assert!(b.all_elements().is_empty());
    }

    #[test]
    fn test_full_sync_skips_own_elements_and_replaces_peer_list() {
        // Arrange
        let mut host = replicator("a", 200.0, 100.0);
        let mut joiner = replicator("b", 400.0, 200.0);
        draw_rect(&mut joiner, Point::new(40.0, 20.0), Point::new(80.0, 40.0));
        pump(&mut joiner, &mut host);
        draw_rect(&mut host, Point::new(100.0, 50.0), Point::new(200.0, 100.0));
        joiner.apply_inbound(
            "stale",
            &MessageBody::AnnotationStart {
                id: "leftover".into(),
                tool: Tool::Line,
                color: "#fff".into(),
                fill_color: None,
                filled: None,
                width: 1.0,
                x: 0.0,
                y: 0.0,
            },
        );

        // Act
        let sync = host.full_sync_snapshot();
        joiner.apply_inbound("host", &sync);

        // Assert
        let MessageBody::AnnotationSync { history_step, elements } = &sync else {
            panic!("expected sync");
        };
        assert_eq!(*history_step, 1);
        assert_eq!(elements.len(), 2);
        let peer = joiner.peer_elements();
        assert_eq!(peer.len(), 1);
        assert!(close(peer[0].end.unwrap(), Point::new(400.0, 200.0)));
        assert_eq!(joiner.all_elements().len(), 2);
    }

    #[test]
    fn test_group_and_ungroup_replicate() {
        // Arrange
        let mut a = replicator("a", 100.0, 100.0);
        let mut b = replicator("b", 100.0, 100.0);
        let r1 = draw_rect(&mut a, Point::new(10.0, 10.0), Point::new(20.0, 20.0));
        let r2 = draw_rect(&mut a, Point::new(40.0, 40.0), Point::new(60.0, 60.0));
        pump(&mut a, &mut b);

        // Act
        let group_id = a.group(&[r1.clone(), r2.clone()]).unwrap();
        pump(&mut a, &mut b);

        // Assert
        assert_eq!(a.local_elements().len(), 1);
        let seen = b.peer_elements();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].id, group_id);
        assert_eq!(seen[0].children.len(), 2);

        // Act – stretch the group box, then ungroup
        a.update_element(
            &group_id,
            &ElementPatch {
                end: Some(Point::new(90.0, 90.0)),
                ..Default::default()
            },
        );
        a.ungroup(&group_id);
        pump(&mut a, &mut b);

        // Assert
        let members = b.peer_elements();
        assert_eq!(members.len(), 2);
        assert!(close(members[1].end.unwrap(), Point::new(90.0, 90.0)));
        assert!(close(members[0].end.unwrap(), Point::new(26.0, 26.0)));
        assert!(close(members[0].start.unwrap(), Point::new(10.0, 10.0)));
        assert_eq!(a.local_elements().len(), 2);
    }

    #[test]
    fn test_group_selection_selects_new_group() {
        let mut r = replicator("me", 100.0, 100.0);
        let a = draw_rect(&mut r, Point::new(1.0, 1.0), Point::new(2.0, 2.0));
        let b = draw_rect(&mut r, Point::new(3.0, 3.0), Point::new(4.0, 4.0));
        let mut selection = SelectionSet::new();
        selection.toggle(a);
        selection.toggle(b);

        let group_id = r.group_selection(&mut selection).unwrap();

        assert_eq!(selection.primary(), Some(group_id.as_str()));
        assert_eq!(selection.len(), 1);
    }

    #[test]
    fn test_legacy_pixel_values_pass_through() {
        // Arrange
        let mut r = replicator("me", 1000.0, 1000.0);

        // Act
        r.apply_inbound(
            "old",
            &MessageBody::AnnotationStart {
                id: "old-1-1".into(),
                tool: Tool::Line,
                color: "#f00".into(),
                fill_color: None,
                filled: None,
                width: 2.0,
                x: 250.0,
                y: 0.5,
            },
        );

        // Assert
        assert!(close(
            r.peer_elements()[0].start.unwrap(),
            Point::new(250.0, 500.0)
        ));
    }

    #[test]
    fn test_pointer_is_denormalized_and_forgotten() {
        let mut r = replicator("me", 200.0, 100.0);
        let at = r.record_pointer("p", 0.5, 0.5);
        assert_eq!(at, Point::new(100.0, 50.0));
        r.forget_peer("p");
        assert_eq!(r.remote_pointers().count(), 0);
    }
}
