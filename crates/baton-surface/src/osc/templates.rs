//! Built-in controller layout catalogs
//!
//! Known-controller defaults shipped with the engine, serving the same role
//! as the MCU's fixed protocol tables: a host can offer them without the
//! user authoring a layout first. They are code-defined and not editable;
//! user layouts are separate documents loaded via `OscTemplate::load`.

use crate::osc::{OscAddressMapping, OscTemplate, TemplatePage};

fn fader(address: String, parameter_id: String) -> OscAddressMapping {
    OscAddressMapping {
        id: address.clone(),
        address,
        parameter_id,
        min_value: 0.0,
        max_value: 1.0,
        send_feedback: true,
        is_enabled: true,
        touch_index: None,
    }
}

fn bipolar(address: String, parameter_id: String) -> OscAddressMapping {
    OscAddressMapping {
        min_value: -1.0,
        max_value: 1.0,
        ..fader(address, parameter_id)
    }
}

/// All built-in layouts
pub fn builtin_templates() -> Vec<OscTemplate> {
    vec![touchosc_mixer(), lemur_mixer(), generic_mixer()]
}

/// Look up a built-in layout by name
pub fn builtin_template(name: &str) -> Option<OscTemplate> {
    builtin_templates().into_iter().find(|t| t.name == name)
}

/// TouchOSC "Mixer" layout: two pages of numbered faders and toggles
pub fn touchosc_mixer() -> OscTemplate {
    let mut page1 = TemplatePage {
        name: "1".to_string(),
        mappings: Vec::new(),
    };
    for i in 1..=4 {
        page1.mappings.push(fader(
            format!("/1/fader{}", i),
            format!("track.{}.volume", i),
        ));
        page1.mappings.push(fader(
            format!("/1/toggle{}", i),
            format!("track.{}.mute", i),
        ));
    }
    page1
        .mappings
        .push(fader("/1/fader5".to_string(), "master.volume".to_string()));

    let mut page2 = TemplatePage {
        name: "2".to_string(),
        mappings: Vec::new(),
    };
    for i in 1..=4 {
        page2.mappings.push(bipolar(
            format!("/2/rotary{}", i),
            format!("track.{}.pan", i),
        ));
    }

    OscTemplate {
        name: "TouchOSC Mixer".to_string(),
        description: "4-channel mixer with pan page".to_string(),
        target_app: "TouchOSC".to_string(),
        mappings: Vec::new(),
        pages: vec![page1, page2],
    }
}

/// Lemur mixer layout: named container addresses
pub fn lemur_mixer() -> OscTemplate {
    let mut mappings = Vec::new();
    for i in 1..=8 {
        mappings.push(fader(
            format!("/mixer/fader{}/x", i),
            format!("track.{}.volume", i),
        ));
        mappings.push(bipolar(
            format!("/mixer/pan{}/x", i),
            format!("track.{}.pan", i),
        ));
    }

    OscTemplate {
        name: "Lemur Mixer".to_string(),
        description: "8-channel mixer".to_string(),
        target_app: "Lemur".to_string(),
        mappings,
        pages: Vec::new(),
    }
}

/// Generic layout for hand-rolled controllers using plain mixer addresses
pub fn generic_mixer() -> OscTemplate {
    let mut mappings = Vec::new();
    for i in 1..=8 {
        mappings.push(fader(
            format!("/mixer/{}/volume", i),
            format!("track.{}.volume", i),
        ));
        mappings.push(bipolar(
            format!("/mixer/{}/pan", i),
            format!("track.{}.pan", i),
        ));
        mappings.push(fader(
            format!("/mixer/{}/mute", i),
            format!("track.{}.mute", i),
        ));
    }
    mappings.push(fader(
        "/mixer/master/volume".to_string(),
        "master.volume".to_string(),
    ));

    OscTemplate {
        name: "Generic Mixer".to_string(),
        description: "8-channel mixer on /mixer/<n>/<control>".to_string(),
        target_app: String::new(),
        mappings,
        pages: Vec::new(),
    }
}
