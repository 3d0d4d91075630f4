//! The OSC mapping engine
//!
//! Dispatch priority for every inbound message, first category wins:
//! transport commands, multi-touch addresses, exact mapping lookup, wildcard
//! mapping fallback, unmapped notification. Source endpoints are tracked per
//! base address so feedback can fan out to every controller driving a
//! surface, not just the configured default endpoint.

use crate::curve::normalize_to_range;
use crate::error::MappingError;
use crate::events::{ControlSource, EventSender, ParamValue, SurfaceEvent, TransportButton};
use crate::osc::{OscAddressMapping, OscTemplate};
use baton_osc::rosc::address::{Matcher, OscAddress};
use baton_osc::{OscMessage, OscServer, OscServerError, OscSink, OscType};
use flume::Receiver;
use std::collections::HashMap;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Mutex;

/// Transport command table: exact address (lowercase) to button.
/// Fires only when the first argument is boolean-true-equivalent.
const TRANSPORT_TABLE: &[(&str, TransportButton)] = &[
    ("/transport/play", TransportButton::Play),
    ("/play", TransportButton::Play),
    ("/transport/stop", TransportButton::Stop),
    ("/stop", TransportButton::Stop),
    ("/transport/record", TransportButton::Record),
    ("/record", TransportButton::Record),
    ("/transport/rewind", TransportButton::Rewind),
    ("/rewind", TransportButton::Rewind),
    ("/transport/forward", TransportButton::FastForward),
    ("/forward", TransportButton::FastForward),
    ("/transport/cycle", TransportButton::Cycle),
    ("/cycle", TransportButton::Cycle),
    ("/transport/click", TransportButton::Click),
    ("/click", TransportButton::Click),
];

/// Tracked multi-touch slots
const TOUCH_SLOTS: usize = 10;

/// Server binding and feedback routing configuration
#[derive(Debug, Clone)]
pub struct OscEngineConfig {
    pub listen_port: u16,
    pub feedback_host: String,
    pub feedback_port: u16,
}

impl Default for OscEngineConfig {
    fn default() -> Self {
        // TouchOSC's out-of-the-box ports
        Self {
            listen_port: 9000,
            feedback_host: "127.0.0.1".to_string(),
            feedback_port: 9001,
        }
    }
}

struct Inner {
    config: OscEngineConfig,
    mappings: Vec<OscAddressMapping>,
    touch_points: [(f32, f32); TOUCH_SLOTS],
    /// Source endpoints per base address, for feedback fan-out
    clients: HashMap<String, Vec<SocketAddr>>,
    param_values: HashMap<String, f64>,
    server: Option<OscServer>,
    sink: Box<dyn OscSink + Send>,
    feedback_addr: Option<SocketAddr>,
}

impl Inner {
    fn resolve_feedback_addr(&mut self) -> Option<SocketAddr> {
        if self.feedback_addr.is_none() {
            let target = (self.config.feedback_host.as_str(), self.config.feedback_port);
            match target.to_socket_addrs() {
                Ok(mut addrs) => self.feedback_addr = addrs.next(),
                Err(e) => {
                    log::warn!(
                        "OSC: Cannot resolve feedback endpoint {}:{}: {}",
                        self.config.feedback_host,
                        self.config.feedback_port,
                        e
                    );
                }
            }
        }
        self.feedback_addr
    }

    fn send_feedback(&mut self, address: &str, value: f32) -> bool {
        match self.resolve_feedback_addr() {
            Some(addr) => self
                .sink
                .send(address, vec![OscType::Float(value)], addr),
            None => false,
        }
    }
}

/// First path segment, the key client endpoints are tracked under
fn base_address(address: &str) -> String {
    address
        .trim_start_matches('/')
        .split('/')
        .next()
        .unwrap_or("")
        .to_lowercase()
}

/// Numeric view of one OSC argument per its type tag
fn numeric_arg(arg: &OscType) -> Option<f32> {
    match arg {
        OscType::Float(f) => Some(*f),
        OscType::Double(d) => Some(*d as f32),
        OscType::Int(i) => Some(*i as f32),
        OscType::Long(l) => Some(*l as f32),
        OscType::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// Boolean-true-equivalent check for transport commands
fn first_arg_truthy(args: &[OscType]) -> bool {
    match args.first() {
        Some(OscType::Float(f)) => *f > 0.5,
        Some(OscType::Double(d)) => *d > 0.5,
        Some(OscType::Int(i)) => *i != 0,
        Some(OscType::Long(l)) => *l != 0,
        Some(OscType::Bool(b)) => *b,
        _ => false,
    }
}

/// `/touch/<id>` with id 0-9
fn touch_slot(address: &str) -> Option<usize> {
    let mut segments = address.trim_start_matches('/').split('/');
    let head = segments.next()?;
    let id = segments.next()?;
    if segments.next().is_some() || !head.eq_ignore_ascii_case("touch") {
        return None;
    }
    let slot: usize = id.parse().ok()?;
    (slot < TOUCH_SLOTS).then_some(slot)
}

/// OSC bidirectional mapping engine
pub struct OscSurfaceEngine {
    inner: Mutex<Inner>,
    events: EventSender,
}

impl OscSurfaceEngine {
    /// Create an engine sending feedback through `sink`
    ///
    /// Returns the engine and the event receiver the host drains. The UDP
    /// listener is not bound until `start()`.
    pub fn new(
        config: OscEngineConfig,
        sink: Box<dyn OscSink + Send>,
    ) -> (Self, Receiver<SurfaceEvent>) {
        let (events, rx) = EventSender::channel();
        let engine = Self {
            inner: Mutex::new(Inner {
                config,
                mappings: Vec::new(),
                touch_points: [(0.0, 0.0); TOUCH_SLOTS],
                clients: HashMap::new(),
                param_values: HashMap::new(),
                server: None,
                sink,
                feedback_addr: None,
            }),
            events,
        };
        (engine, rx)
    }

    /// Bind the UDP listener; starting twice is a no-op
    ///
    /// Any failure rolls the engine fully back to stopped before it
    /// propagates.
    pub fn start(&self) -> Result<(), OscServerError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.server.is_some() {
            log::debug!("OSC: Engine already running");
            return Ok(());
        }
        match OscServer::bind(inner.config.listen_port) {
            Ok(server) => {
                inner.server = Some(server);
                inner.resolve_feedback_addr();
                self.events.emit(SurfaceEvent::ConnectionChanged { connected: true });
                Ok(())
            }
            Err(e) => {
                Self::stop_locked(&mut inner, &self.events);
                Err(e)
            }
        }
    }

    /// Tear the listener down and forget tracked clients; idempotent
    pub fn stop(&self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.server.is_some() {
            Self::stop_locked(&mut inner, &self.events);
        }
    }

    fn stop_locked(inner: &mut Inner, events: &EventSender) {
        if let Some(mut server) = inner.server.take() {
            server.stop();
            events.emit(SurfaceEvent::ConnectionChanged { connected: false });
        }
        inner.clients.clear();
    }

    /// Stop then start
    pub fn restart(&self) -> Result<(), OscServerError> {
        self.stop();
        self.start()
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock().unwrap().server.is_some()
    }

    /// The listener's bound address while running
    pub fn listen_addr(&self) -> Option<SocketAddr> {
        let inner = self.inner.lock().unwrap();
        inner.server.as_ref().map(|s| s.local_addr())
    }

    /// Drain pending datagrams from the listener and dispatch each
    ///
    /// Call from the host's tick; returns the number of messages handled.
    pub fn pump(&self) -> usize {
        let receiver = {
            let inner = self.inner.lock().unwrap();
            match &inner.server {
                Some(server) => server.messages(),
                None => return 0,
            }
        };
        let mut handled = 0;
        while let Ok((msg, source)) = receiver.try_recv() {
            self.process_message(&msg, source);
            handled += 1;
        }
        handled
    }

    /// Dispatch one inbound message
    pub fn process_message(&self, msg: &OscMessage, source: SocketAddr) {
        let mut inner = self.inner.lock().unwrap();

        // Track the sender for feedback fan-out regardless of what matches
        let base = base_address(&msg.addr);
        if !base.is_empty() {
            let entry = inner.clients.entry(base).or_default();
            if !entry.contains(&source) {
                log::debug!("OSC: Tracking client {} for /{}...", source, msg.addr.trim_start_matches('/'));
                entry.push(source);
            }
        }

        // 1. Transport commands by exact, case-insensitive address
        let lower = msg.addr.to_lowercase();
        if let Some((_, button)) = TRANSPORT_TABLE.iter().find(|(addr, _)| *addr == lower) {
            if first_arg_truthy(&msg.args) {
                self.events.emit(SurfaceEvent::TransportButton {
                    button: *button,
                    pressed: true,
                });
            }
            return;
        }

        // 2. Multi-touch
        if lower.contains("multi") {
            let values: Vec<f32> = msg.args.iter().filter_map(numeric_arg).collect();
            self.events.emit(SurfaceEvent::MultiTouch { values });
            return;
        }
        if let Some(slot) = touch_slot(&msg.addr) {
            let nums: Vec<f32> = msg.args.iter().filter_map(numeric_arg).collect();
            if nums.len() >= 2 {
                inner.touch_points[slot] = (nums[0], nums[1]);
                self.events.emit(SurfaceEvent::TouchPoint {
                    index: slot as u8,
                    x: nums[0],
                    y: nums[1],
                });
                return;
            }
        }

        // 3. Exact mapping lookup, then wildcard fallback
        let raw = msg.args.iter().find_map(numeric_arg).unwrap_or(0.0);
        let mut matched = false;

        let Inner {
            mappings,
            param_values,
            ..
        } = &mut *inner;

        for mapping in mappings
            .iter()
            .filter(|m| m.is_enabled && m.address == msg.addr)
        {
            Self::apply_mapping(&self.events, param_values, mapping, &msg.addr, raw);
            matched = true;
        }

        if !matched {
            let concrete = OscAddress::new(msg.addr.clone()).ok();
            if let Some(concrete) = concrete {
                for mapping in mappings.iter().filter(|m| m.is_enabled) {
                    let Ok(matcher) = Matcher::new(&mapping.address) else {
                        continue;
                    };
                    if matcher.match_address(&concrete) {
                        Self::apply_mapping(&self.events, param_values, mapping, &msg.addr, raw);
                        matched = true;
                    }
                }
            }
        }

        // 4. Nothing wanted it
        if !matched {
            log::trace!("OSC: Unmapped message {}", msg.addr);
            self.events.emit(SurfaceEvent::UnmappedOsc {
                address: msg.addr.clone(),
            });
        }
    }

    fn apply_mapping(
        events: &EventSender,
        param_values: &mut HashMap<String, f64>,
        mapping: &OscAddressMapping,
        address: &str,
        raw: f32,
    ) {
        // No curve options here, unlike the MIDI engine: plain linear scale
        let clamped = raw.clamp(0.0, 1.0) as f64;
        let scaled = mapping.min_value + clamped * (mapping.max_value - mapping.min_value);
        param_values.insert(mapping.parameter_id.clone(), scaled);
        events.emit(SurfaceEvent::ParameterChanged {
            parameter_id: mapping.parameter_id.clone(),
            raw: raw as f64,
            scaled,
            source: ControlSource::Osc {
                address: address.to_string(),
            },
        });
    }

    /// Feedback path: the host's parameter changed, reflect it to every
    /// enabled, feedback-flagged mapping for that parameter
    pub fn update_parameter(&self, parameter_id: &str, value: impl Into<ParamValue>) {
        let value = value.into().as_f64();
        let mut inner = self.inner.lock().unwrap();
        inner.param_values.insert(parameter_id.to_string(), value);

        let targets: Vec<(String, f32)> = inner
            .mappings
            .iter()
            .filter(|m| m.is_enabled && m.send_feedback && m.parameter_id == parameter_id)
            .map(|m| {
                let norm = normalize_to_range(value, m.min_value, m.max_value) as f32;
                (m.address.clone(), norm)
            })
            .collect();

        for (address, norm) in targets {
            inner.send_feedback(&address, norm);
        }
    }

    /// Send one float message to the default feedback endpoint
    pub fn send_feedback(&self, address: &str, value: f32) -> bool {
        let mut inner = self.inner.lock().unwrap();
        inner.send_feedback(address, value)
    }

    /// Send to the default endpoint and every tracked client under the
    /// address's base segment (phone + tablet sharing one listener port)
    pub fn send_feedback_to_all(&self, address: &str, value: f32) {
        let mut inner = self.inner.lock().unwrap();
        inner.send_feedback(address, value);

        let default = inner.feedback_addr;
        let clients = inner
            .clients
            .get(&base_address(address))
            .cloned()
            .unwrap_or_default();
        for client in clients {
            if Some(client) == default {
                continue;
            }
            inner
                .sink
                .send(address, vec![OscType::Float(value)], client);
        }
    }

    /// Current value of a parameter, if any mapping has routed one
    pub fn parameter_value(&self, parameter_id: &str) -> Option<f64> {
        self.inner
            .lock()
            .unwrap()
            .param_values
            .get(parameter_id)
            .copied()
    }

    /// Last tracked position of a touch slot
    pub fn touch_point(&self, index: usize) -> Option<(f32, f32)> {
        self.inner
            .lock()
            .unwrap()
            .touch_points
            .get(index)
            .copied()
    }

    /// Add or replace (by id) an address mapping
    pub fn add_mapping(&self, mut mapping: OscAddressMapping) -> Result<(), MappingError> {
        if mapping.address.is_empty() {
            return Err(MappingError::EmptyAddress);
        }
        if mapping.parameter_id.is_empty() {
            return Err(MappingError::EmptyParameterId);
        }
        mapping.ensure_id();

        let mut inner = self.inner.lock().unwrap();
        match inner.mappings.iter().position(|m| m.id == mapping.id) {
            Some(index) => inner.mappings[index] = mapping,
            None => inner.mappings.push(mapping),
        }
        Ok(())
    }

    /// Remove a mapping by id; false if absent
    pub fn remove_mapping(&self, id: &str) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.mappings.len();
        inner.mappings.retain(|m| m.id != id);
        inner.mappings.len() != before
    }

    /// Snapshot of the mappings
    pub fn mappings(&self) -> Vec<OscAddressMapping> {
        self.inner.lock().unwrap().mappings.clone()
    }

    /// Replace the active mapping set wholesale with a template's layout
    pub fn apply_template(&self, template: &OscTemplate) {
        let mut inner = self.inner.lock().unwrap();
        inner.mappings = template.flattened();
        log::info!(
            "OSC: Applied template '{}' ({} mappings)",
            template.name,
            inner.mappings.len()
        );
    }
}

impl Drop for OscSurfaceEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex as StdMutex};

    type SinkLog = Arc<StdMutex<Vec<(String, Vec<OscType>, SocketAddr)>>>;

    #[derive(Default)]
    struct RecordingSink {
        sent: SinkLog,
    }

    impl RecordingSink {
        fn boxed() -> (Box<dyn OscSink + Send>, SinkLog) {
            let sink = RecordingSink::default();
            let log = sink.sent.clone();
            (Box::new(sink), log)
        }
    }

    impl OscSink for RecordingSink {
        fn send(&mut self, addr: &str, args: Vec<OscType>, to: SocketAddr) -> bool {
            self.sent.lock().unwrap().push((addr.to_string(), args, to));
            true
        }
    }

    fn engine() -> (OscSurfaceEngine, Receiver<SurfaceEvent>, SinkLog) {
        let (sink, log) = RecordingSink::boxed();
        let (engine, rx) = OscSurfaceEngine::new(OscEngineConfig::default(), sink);
        (engine, rx, log)
    }

    fn msg(addr: &str, args: Vec<OscType>) -> OscMessage {
        OscMessage {
            addr: addr.to_string(),
            args,
        }
    }

    fn source(port: u16) -> SocketAddr {
        format!("10.0.0.2:{}", port).parse().unwrap()
    }

    fn volume_mapping(address: &str) -> OscAddressMapping {
        OscAddressMapping {
            id: String::new(),
            address: address.to_string(),
            parameter_id: "track.3.volume".to_string(),
            min_value: 0.0,
            max_value: 1.0,
            send_feedback: true,
            is_enabled: true,
            touch_index: None,
        }
    }

    #[test]
    fn test_transport_recognition() {
        let (engine, rx, _) = engine();
        engine.process_message(&msg("/transport/play", vec![OscType::Float(1.0)]), source(1));
        engine.process_message(&msg("/PLAY", vec![OscType::Int(1)]), source(1));

        let buttons: Vec<_> = rx
            .drain()
            .filter_map(|e| match e {
                SurfaceEvent::TransportButton { button, pressed } => Some((button, pressed)),
                _ => None,
            })
            .collect();
        assert_eq!(
            buttons,
            vec![(TransportButton::Play, true), (TransportButton::Play, true)]
        );
    }

    #[test]
    fn test_transport_release_is_consumed_silently() {
        let (engine, rx, _) = engine();
        engine.process_message(&msg("/play", vec![OscType::Float(0.0)]), source(1));

        // Recognized as transport (so not unmapped), but nothing fires
        let events: Vec<_> = rx.drain().collect();
        assert!(events.is_empty());
    }

    #[test]
    fn test_transport_truthiness_by_type() {
        let (engine, rx, _) = engine();
        engine.process_message(&msg("/stop", vec![OscType::Bool(true)]), source(1));
        engine.process_message(&msg("/stop", vec![OscType::Bool(false)]), source(1));
        engine.process_message(&msg("/stop", vec![OscType::Int(0)]), source(1));
        engine.process_message(&msg("/stop", vec![OscType::Float(0.4)]), source(1));

        let fired = rx
            .drain()
            .filter(|e| matches!(e, SurfaceEvent::TransportButton { .. }))
            .count();
        assert_eq!(fired, 1);
    }

    #[test]
    fn test_multi_touch_address() {
        let (engine, rx, _) = engine();
        engine.process_message(
            &msg(
                "/pads/multixy1",
                vec![OscType::Float(0.25), OscType::Float(0.75), OscType::Int(2)],
            ),
            source(1),
        );

        let events: Vec<_> = rx.drain().collect();
        assert_eq!(
            events,
            vec![SurfaceEvent::MultiTouch {
                values: vec![0.25, 0.75, 2.0]
            }]
        );
    }

    #[test]
    fn test_touch_point_tracking() {
        let (engine, rx, _) = engine();
        engine.process_message(
            &msg("/touch/3", vec![OscType::Float(0.1), OscType::Float(0.9)]),
            source(1),
        );
        assert_eq!(engine.touch_point(3), Some((0.1, 0.9)));

        let events: Vec<_> = rx.drain().collect();
        assert_eq!(
            events,
            vec![SurfaceEvent::TouchPoint { index: 3, x: 0.1, y: 0.9 }]
        );

        // Out-of-range slot is not a touch address
        engine.process_message(
            &msg("/touch/12", vec![OscType::Float(0.5), OscType::Float(0.5)]),
            source(1),
        );
        assert!(rx
            .drain()
            .any(|e| matches!(e, SurfaceEvent::UnmappedOsc { .. })));
    }

    #[test]
    fn test_exact_mapping_scales() {
        let (engine, rx, _) = engine();
        engine.add_mapping(volume_mapping("/mixer/3/volume")).unwrap();

        engine.process_message(&msg("/mixer/3/volume", vec![OscType::Float(0.5)]), source(1));

        let events: Vec<_> = rx
            .drain()
            .filter(|e| matches!(e, SurfaceEvent::ParameterChanged { .. }))
            .collect();
        match &events[..] {
            [SurfaceEvent::ParameterChanged { parameter_id, raw, scaled, source }] => {
                assert_eq!(parameter_id, "track.3.volume");
                assert!((raw - 0.5).abs() < 1e-6);
                assert!((scaled - 0.5).abs() < 1e-6);
                assert_eq!(
                    *source,
                    ControlSource::Osc { address: "/mixer/3/volume".to_string() }
                );
            }
            other => panic!("unexpected events: {:?}", other),
        }
    }

    #[test]
    fn test_wildcard_fallback_matches_same_as_exact() {
        let (engine, rx, _) = engine();
        engine.add_mapping(volume_mapping("/mixer/*/volume")).unwrap();

        engine.process_message(&msg("/mixer/3/volume", vec![OscType::Float(0.5)]), source(1));

        let events: Vec<_> = rx
            .drain()
            .filter_map(|e| match e {
                SurfaceEvent::ParameterChanged { parameter_id, scaled, .. } => {
                    Some((parameter_id, scaled))
                }
                _ => None,
            })
            .collect();
        assert_eq!(events, vec![("track.3.volume".to_string(), 0.5)]);
    }

    #[test]
    fn test_exact_wins_over_wildcard() {
        let (engine, rx, _) = engine();
        let mut wild = volume_mapping("/mixer/*/volume");
        wild.parameter_id = "wild".to_string();
        engine.add_mapping(wild).unwrap();
        let mut exact = volume_mapping("/mixer/3/volume");
        exact.parameter_id = "exact".to_string();
        engine.add_mapping(exact).unwrap();

        engine.process_message(&msg("/mixer/3/volume", vec![OscType::Float(1.0)]), source(1));

        let ids: Vec<_> = rx
            .drain()
            .filter_map(|e| match e {
                SurfaceEvent::ParameterChanged { parameter_id, .. } => Some(parameter_id),
                _ => None,
            })
            .collect();
        assert_eq!(ids, vec!["exact".to_string()]);
    }

    #[test]
    fn test_int_and_bool_arguments_scale() {
        let (engine, rx, _) = engine();
        let mut mapping = volume_mapping("/mixer/3/mute");
        mapping.parameter_id = "track.3.mute".to_string();
        engine.add_mapping(mapping).unwrap();

        engine.process_message(&msg("/mixer/3/mute", vec![OscType::Bool(true)]), source(1));
        engine.process_message(&msg("/mixer/3/mute", vec![OscType::Int(0)]), source(1));

        let values: Vec<_> = rx
            .drain()
            .filter_map(|e| match e {
                SurfaceEvent::ParameterChanged { scaled, .. } => Some(scaled),
                _ => None,
            })
            .collect();
        assert_eq!(values, vec![1.0, 0.0]);
    }

    #[test]
    fn test_unmapped_notification() {
        let (engine, rx, _) = engine();
        engine.process_message(&msg("/nothing/here", vec![]), source(1));
        let events: Vec<_> = rx.drain().collect();
        assert_eq!(
            events,
            vec![SurfaceEvent::UnmappedOsc { address: "/nothing/here".to_string() }]
        );
    }

    #[test]
    fn test_disabled_mapping_falls_to_unmapped() {
        let (engine, rx, _) = engine();
        let mut mapping = volume_mapping("/mixer/3/volume");
        mapping.is_enabled = false;
        engine.add_mapping(mapping).unwrap();

        engine.process_message(&msg("/mixer/3/volume", vec![OscType::Float(0.5)]), source(1));
        assert!(rx
            .drain()
            .any(|e| matches!(e, SurfaceEvent::UnmappedOsc { .. })));
    }

    #[test]
    fn test_update_parameter_sends_feedback() {
        let (engine, _rx, log) = engine();
        engine.add_mapping(volume_mapping("/mixer/3/volume")).unwrap();

        engine.update_parameter("track.3.volume", 0.25);

        let sent = log.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "/mixer/3/volume");
        assert_eq!(sent[0].1, vec![OscType::Float(0.25)]);
    }

    #[test]
    fn test_update_parameter_renormalizes_range() {
        let (engine, _rx, log) = engine();
        let mut mapping = volume_mapping("/mixer/3/pan");
        mapping.parameter_id = "track.3.pan".to_string();
        mapping.min_value = -1.0;
        mapping.max_value = 1.0;
        engine.add_mapping(mapping).unwrap();

        engine.update_parameter("track.3.pan", 0.0);

        let sent = log.lock().unwrap();
        assert_eq!(sent[0].1, vec![OscType::Float(0.5)]);
    }

    #[test]
    fn test_update_parameter_skips_non_feedback_mappings() {
        let (engine, _rx, log) = engine();
        let mut mapping = volume_mapping("/mixer/3/volume");
        mapping.send_feedback = false;
        engine.add_mapping(mapping).unwrap();

        engine.update_parameter("track.3.volume", 0.25);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_client_tracking_and_fan_out() {
        let (engine, _rx, log) = engine();
        engine.add_mapping(volume_mapping("/mixer/1/volume")).unwrap();

        // Two controllers drive the mixer surface
        engine.process_message(&msg("/mixer/1/volume", vec![OscType::Float(0.1)]), source(7001));
        engine.process_message(&msg("/mixer/2/volume", vec![OscType::Float(0.2)]), source(7002));

        log.lock().unwrap().clear();
        engine.send_feedback_to_all("/mixer/1/volume", 0.8);

        let sent = log.lock().unwrap();
        // Default endpoint plus both tracked clients
        assert_eq!(sent.len(), 3);
        let targets: Vec<_> = sent.iter().map(|(_, _, to)| *to).collect();
        assert!(targets.contains(&source(7001)));
        assert!(targets.contains(&source(7002)));
    }

    #[test]
    fn test_apply_template_replaces_wholesale() {
        let (engine, _rx, _) = engine();
        engine.add_mapping(volume_mapping("/old/address")).unwrap();

        let template = crate::osc::templates::generic_mixer();
        engine.apply_template(&template);

        let mappings = engine.mappings();
        assert_eq!(mappings.len(), template.flattened().len());
        assert!(mappings.iter().all(|m| m.address != "/old/address"));
    }

    #[test]
    fn test_add_mapping_contract_faults() {
        let (engine, _rx, _) = engine();
        let mut empty_addr = volume_mapping("");
        empty_addr.id = "x".to_string();
        assert!(engine.add_mapping(empty_addr).is_err());

        let mut empty_param = volume_mapping("/a");
        empty_param.parameter_id = String::new();
        assert!(engine.add_mapping(empty_param).is_err());
    }

    #[test]
    fn test_start_stop_lifecycle() {
        let (sink, _) = RecordingSink::boxed();
        let config = OscEngineConfig {
            listen_port: 0,
            ..Default::default()
        };
        let (engine, rx) = OscSurfaceEngine::new(config, sink);

        engine.start().unwrap();
        assert!(engine.is_running());
        let addr = engine.listen_addr().unwrap();
        assert_ne!(addr.port(), 0);

        // Second start is a no-op
        engine.start().unwrap();

        engine.stop();
        assert!(!engine.is_running());
        engine.stop(); // idempotent

        let states: Vec<_> = rx
            .drain()
            .filter_map(|e| match e {
                SurfaceEvent::ConnectionChanged { connected } => Some(connected),
                _ => None,
            })
            .collect();
        assert_eq!(states, vec![true, false]);
    }

    #[test]
    fn test_start_failure_rolls_back() {
        let (sink_a, _) = RecordingSink::boxed();
        let (sink_b, _) = RecordingSink::boxed();

        let (first, _rx_a) = OscSurfaceEngine::new(
            OscEngineConfig { listen_port: 0, ..Default::default() },
            sink_a,
        );
        first.start().unwrap();
        let taken_port = first.listen_addr().unwrap().port();

        let (second, _rx_b) = OscSurfaceEngine::new(
            OscEngineConfig { listen_port: taken_port, ..Default::default() },
            sink_b,
        );
        assert!(second.start().is_err());
        assert!(!second.is_running());
    }

    #[test]
    fn test_pump_dispatches_from_the_wire() {
        let (sink, _) = RecordingSink::boxed();
        let (engine, rx) = OscSurfaceEngine::new(
            OscEngineConfig { listen_port: 0, ..Default::default() },
            sink,
        );
        engine.add_mapping(volume_mapping("/mixer/3/volume")).unwrap();
        engine.start().unwrap();

        let mut target = engine.listen_addr().unwrap();
        target.set_ip("127.0.0.1".parse().unwrap());

        let socket = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let packet = baton_osc::rosc::OscPacket::Message(msg(
            "/mixer/3/volume",
            vec![OscType::Float(1.0)],
        ));
        let bytes = baton_osc::rosc::encoder::encode(&packet).unwrap();
        socket.send_to(&bytes, target).unwrap();

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(2);
        let mut got = false;
        while std::time::Instant::now() < deadline {
            engine.pump();
            if rx
                .try_iter()
                .any(|e| matches!(e, SurfaceEvent::ParameterChanged { .. }))
            {
                got = true;
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        assert!(got, "mapped parameter change never arrived");
    }
}
