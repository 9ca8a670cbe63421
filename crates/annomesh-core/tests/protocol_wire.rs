//! Integration tests for the annomesh-core wire protocol.
//!
//! These tests exercise the public API the way a peer does: build elements
//! in pixel space, normalize them for the wire, encode, decode on the other
//! side, and denormalize against a different canvas size.

use annomesh_core::{
    decode_message, encode_message, AnnotationElement, CanvasSpace, ElementPatch, Frame,
    MessageBody, Point, ProtocolError, Style, Tool, WireMessage,
};

fn space(w: f64, h: f64) -> CanvasSpace {
    CanvasSpace::Viewport(Frame::new(w, h).expect("valid frame"))
}

#[test]
fn test_element_survives_wire_between_different_viewports() {
    // Arrange – sender draws on a 1920x1080 canvas
    let sender = space(1920.0, 1080.0);
    let receiver = space(960.0, 540.0);
    let mut stroke =
        AnnotationElement::begin("K7M2P-1-0", Tool::Pencil, Style::stroke("#FF3B30", 4.0), Point::new(100.0, 100.0));
    stroke.extend(Point::new(400.0, 300.0));
    stroke.is_active = false;
    let wire_element = stroke.map_points(|p| sender.to_wire(p));

    // Act
    let frame = encode_message(&WireMessage::new(
        "K7M2P",
        MessageBody::AnnotationElement {
            element: wire_element,
        },
    ))
    .expect("encode");
    let decoded = decode_message(&frame).expect("decode");

    // Assert
    let MessageBody::AnnotationElement { element } = decoded.body else {
        panic!("unexpected body {:?}", decoded.body);
    };
    let local = element.map_points(|p| receiver.from_wire(p));
    assert_eq!(local.points.len(), 2);
    assert!((local.points[1].x - 200.0).abs() < 1e-9);
    assert!((local.points[1].y - 150.0).abs() < 1e-9);
    assert_eq!(local.style, stroke.style);
}

#[test]
fn test_partial_update_omits_unchanged_fields_on_the_wire() {
    // Arrange
    let patch = ElementPatch {
        rotation: Some(1.5),
        ..Default::default()
    };

    // Act
    let frame = encode_message(&WireMessage::new(
        "p",
        MessageBody::ElementUpdate {
            id: "e".into(),
            element: patch,
        },
    ))
    .expect("encode");

    // Assert
    let value: serde_json::Value = serde_json::from_str(&frame).expect("json");
    assert_eq!(value["element"], serde_json::json!({"rotation": 1.5}));
}

#[test]
fn test_sync_with_group_children_decodes() {
    // Arrange
    let a = AnnotationElement::begin("a", Tool::Rect, Style::default(), Point::new(0.0, 0.0));
    let mut b = AnnotationElement::begin("b", Tool::Rect, Style::default(), Point::new(10.0, 10.0));
    b.extend(Point::new(20.0, 20.0));
    let group = AnnotationElement::group("g", vec![a, b]).expect("group");
    let msg = WireMessage::new(
        "host",
        MessageBody::AnnotationSync {
            elements: vec![group.clone()],
            history_step: 1,
        },
    );

    // Act
    let decoded = decode_message(&encode_message(&msg).expect("encode")).expect("decode");

    // Assert
    assert_eq!(decoded, msg);
}

#[test]
fn test_legacy_pixel_message_passes_through() {
    // Arrange – an old peer sent raw pixels
    let frame = r##"{"peerId":"old","type":"ANNOTATION_START","id":"e","tool":"line","color":"#000","width":2,"x":640,"y":0.5}"##;
    let receiver = space(1280.0, 720.0);

    // Act
    let msg = decode_message(frame).expect("decode");

    // Assert
    let MessageBody::AnnotationStart { x, y, .. } = msg.body else {
        panic!("expected start");
    };
    assert_eq!(receiver.from_wire(Point::new(x, y)), Point::new(640.0, 360.0));
}

#[test]
fn test_garbage_frames_never_panic() {
    let frames = ["", "{}", "[]", "null", r#"{"type":7}"#, r#"{"type":"GROUP_CREATE","groupId":1}"#];
    for frame in frames {
        let result = decode_message(frame);
        assert!(result.is_err(), "{frame:?} must be rejected");
    }
    assert_eq!(decode_message(r#"{"type":7}"#), Err(ProtocolError::MissingType));
}
