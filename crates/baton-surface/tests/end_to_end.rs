//! Cross-engine scenarios driving the public surface the way a host would:
//! raw messages in, normalized events out, parameter updates back to the wire.

use baton_midi::{MidiEvent, MidiSender};
use baton_osc::{OscSink, OscType};
use baton_surface::{
    CcMapping, ControlSource, McuEngine, MidiMapEngine, OscAddressMapping, OscEngineConfig,
    OscSurfaceEngine, Protocol, ResponseCurve, SurfaceEvent,
};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct RecordingMidi {
    sent: Arc<Mutex<Vec<MidiEvent>>>,
}

impl RecordingMidi {
    fn boxed() -> (Box<dyn MidiSender + Send>, Arc<Mutex<Vec<MidiEvent>>>) {
        let sender = RecordingMidi::default();
        let log = sender.sent.clone();
        (Box::new(sender), log)
    }
}

impl MidiSender for RecordingMidi {
    fn send_event(&mut self, event: &MidiEvent) -> bool {
        self.sent.lock().unwrap().push(*event);
        true
    }
    fn send_sysex(&mut self, _data: &[u8]) -> bool {
        true
    }
}

#[derive(Default)]
struct RecordingOsc {
    sent: Arc<Mutex<Vec<(String, Vec<OscType>, SocketAddr)>>>,
}

impl OscSink for RecordingOsc {
    fn send(&mut self, addr: &str, args: Vec<OscType>, to: SocketAddr) -> bool {
        self.sent.lock().unwrap().push((addr.to_string(), args, to));
        true
    }
}

/// The canonical round trip: omni CC7 drives a volume parameter, the host's
/// reply lands back on the wire as CC7 value 64 on channel 0.
#[test]
fn midi_volume_round_trip() {
    let (sender, wire) = RecordingMidi::boxed();
    let (engine, events) = MidiMapEngine::new(sender);

    engine
        .add_cc_mapping(CcMapping {
            id: String::new(),
            channel: -1,
            cc_number: 7,
            parameter_id: "track.1.volume".to_string(),
            name: String::new(),
            min_value: 0.0,
            max_value: 1.0,
            curve: ResponseCurve::Linear,
            send_feedback: true,
            is_enabled: true,
            is_14_bit: false,
            soft_takeover: false,
            last_value: 0.0,
            takeover_engaged: false,
        })
        .unwrap();

    // Physical move arrives on channel 2; omni filter accepts it
    engine.process_event(&MidiEvent::ControlChange {
        channel: 2,
        controller: 7,
        value: 127,
    });

    let changed: Vec<_> = events
        .drain()
        .filter_map(|e| match e {
            SurfaceEvent::ParameterChanged {
                parameter_id,
                raw,
                scaled,
                source,
            } => Some((parameter_id, raw, scaled, source)),
            _ => None,
        })
        .collect();
    assert_eq!(changed.len(), 1);
    assert_eq!(changed[0].0, "track.1.volume");
    assert_eq!(changed[0].1, 127.0);
    assert!((changed[0].2 - 1.0).abs() < 1e-9);
    assert_eq!(changed[0].3, ControlSource::MidiCc { channel: 2, cc: 7 });

    // Host moves the parameter; feedback goes out on channel 0
    engine.update_parameter("track.1.volume", 0.5);
    assert_eq!(
        *wire.lock().unwrap(),
        vec![MidiEvent::ControlChange {
            channel: 0,
            controller: 7,
            value: 64
        }]
    );
}

/// MCU and generic engines run side by side off the same decoded stream
/// without sharing any state.
#[test]
fn mcu_and_map_engines_are_independent() {
    let (mcu_sender, _) = RecordingMidi::boxed();
    let (mcu, mcu_events) = McuEngine::new(Protocol::Mcu, 16, mcu_sender);

    let (map_sender, _) = RecordingMidi::boxed();
    let (map, map_events) = MidiMapEngine::new(map_sender);

    // A fader move on the MCU surface
    let fader = MidiEvent::PitchBend {
        channel: 0,
        value: 16383,
    };
    mcu.process_event(&fader);
    map.process_event(&fader); // generic engine ignores pitch bend

    assert!(mcu_events
        .drain()
        .any(|e| matches!(e, SurfaceEvent::FaderMoved { value: 16383, .. })));
    assert_eq!(map_events.drain().count(), 0);
}

/// OSC wildcard layout drives the same parameter ids a MIDI mapping would,
/// and host updates fan back out through the OSC sink.
#[test]
fn osc_layout_round_trip() {
    let sink = RecordingOsc::default();
    let wire = sink.sent.clone();
    let (engine, events) = OscSurfaceEngine::new(OscEngineConfig::default(), Box::new(sink));

    engine
        .add_mapping(OscAddressMapping {
            id: String::new(),
            address: "/mixer/*/volume".to_string(),
            parameter_id: "track.4.volume".to_string(),
            min_value: 0.0,
            max_value: 1.0,
            send_feedback: true,
            is_enabled: true,
            touch_index: None,
        })
        .unwrap();

    let source: SocketAddr = "10.1.1.5:9000".parse().unwrap();
    engine.process_message(
        &baton_osc::OscMessage {
            addr: "/mixer/4/volume".to_string(),
            args: vec![OscType::Float(0.75)],
        },
        source,
    );

    let changed: Vec<_> = events
        .drain()
        .filter_map(|e| match e {
            SurfaceEvent::ParameterChanged {
                parameter_id,
                scaled,
                ..
            } => Some((parameter_id, scaled)),
            _ => None,
        })
        .collect();
    assert_eq!(changed, vec![("track.4.volume".to_string(), 0.75)]);

    engine.update_parameter("track.4.volume", 0.25);
    let sent = wire.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "/mixer/*/volume");
    assert_eq!(sent[0].1, vec![OscType::Float(0.25)]);
}

/// Learn a knob, save the preset, load it into a fresh engine, and verify
/// the learned mapping still routes.
#[test]
fn learn_save_load_cycle() {
    let (sender, _) = RecordingMidi::boxed();
    let (engine, events) = MidiMapEngine::new(sender);

    engine
        .start_learning("fx.1.wet", 0.0, 100.0, ResponseCurve::Logarithmic)
        .unwrap();
    engine.process_event(&MidiEvent::ControlChange {
        channel: 0,
        controller: 21,
        value: 3,
    });
    assert!(!engine.is_learning());
    events.drain().count();

    let preset = engine.to_preset("Learned", "", "", "Test Device");
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("learned.json");
    preset.save(&path).unwrap();

    let (sender2, _) = RecordingMidi::boxed();
    let (fresh, fresh_events) = MidiMapEngine::new(sender2);
    fresh.apply_preset(&baton_surface::MappingPreset::load(&path).unwrap());

    fresh.process_event(&MidiEvent::ControlChange {
        channel: 0,
        controller: 21,
        value: 127,
    });
    let changed: Vec<_> = fresh_events
        .drain()
        .filter_map(|e| match e {
            SurfaceEvent::ParameterChanged {
                parameter_id,
                scaled,
                ..
            } => Some((parameter_id, scaled)),
            _ => None,
        })
        .collect();
    assert_eq!(changed.len(), 1);
    assert_eq!(changed[0].0, "fx.1.wet");
    assert!((changed[0].1 - 100.0).abs() < 1e-9);
}
