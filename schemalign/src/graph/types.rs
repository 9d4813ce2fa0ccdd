//! Box–Pin–Color (BPC) graph data types
//!
//! These types are the interchange format between the matching engine and
//! every collaborator (circuit conversion, corpus storage, visualisation).
//! They serialize to the camelCase JSON shape:
//!
//! ```json
//! { "boxes": [{ "boxId": "U1", "kind": "fixed", "center": { "x": 0, "y": 0 } }],
//!   "pins":  [{ "boxId": "U1", "pinId": "1", "networkId": "N1", "color": "vcc",
//!               "offset": { "x": -2, "y": 0 } }] }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

use crate::core::{Result, SchemalignError};

/// Color carried by pins that only mark the centre of a component.
pub const CENTER_COLOR: &str = "component_center";

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(
    /// Identifier of a box, unique within one graph.
    BoxId
);
string_id!(
    /// Identifier of a pin, unique within its owning box.
    PinId
);
string_id!(
    /// Opaque network identifier; pins sharing one are electrically the same node.
    NetworkId
);
string_id!(
    /// Semantic pin tag such as `vcc`, `gnd`, `normal` or `component_center`.
    Color
);
string_id!(
    /// A `color/pinCount` tag naming a component role that may not repeat
    /// within one partition (e.g. `vcc/2` for a decoupling capacitor).
    SingletonKey
);

impl Color {
    pub fn is_center(&self) -> bool {
        self.0 == CENTER_COLOR
    }
}

impl SingletonKey {
    pub fn from_parts(color: &Color, pin_count: usize) -> Self {
        Self(format!("{}/{}", color, pin_count))
    }

    /// Split into `(color, pinCount)`; `None` when the key is malformed.
    pub fn parts(&self) -> Option<(Color, usize)> {
        let (color, count) = self.0.rsplit_once('/')?;
        Some((Color::from(color), count.parse().ok()?))
    }
}

/// 2-D point or offset
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    pub fn plus(&self, other: &Point) -> Self {
        self.translated(other.x, other.y)
    }

    pub fn minus(&self, other: &Point) -> Self {
        Self::new(self.x - other.x, self.y - other.y)
    }
}

/// Placement state of a box. A fixed box always carries a centre.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Placement {
    Fixed {
        center: Point,
    },
    Floating {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        center: Option<Point>,
    },
}

impl Placement {
    pub fn center(&self) -> Option<Point> {
        match self {
            Placement::Fixed { center } => Some(*center),
            Placement::Floating { center } => *center,
        }
    }

    pub fn is_fixed(&self) -> bool {
        matches!(self, Placement::Fixed { .. })
    }

    /// Same placement kind with the centre (if any) moved by `(dx, dy)`.
    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        match self {
            Placement::Fixed { center } => Placement::Fixed {
                center: center.translated(dx, dy),
            },
            Placement::Floating { center } => Placement::Floating {
                center: center.map(|c| c.translated(dx, dy)),
            },
        }
    }
}

/// A component (or symbol) of the circuit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BpcBox {
    pub box_id: BoxId,

    #[serde(flatten)]
    pub placement: Placement,

    /// Free-form attributes, e.g. `{"netLabel": true}`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl BpcBox {
    pub fn fixed(box_id: impl Into<BoxId>, x: f64, y: f64) -> Self {
        Self {
            box_id: box_id.into(),
            placement: Placement::Fixed {
                center: Point::new(x, y),
            },
            attributes: BTreeMap::new(),
        }
    }

    pub fn floating(box_id: impl Into<BoxId>) -> Self {
        Self {
            box_id: box_id.into(),
            placement: Placement::Floating { center: None },
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn center(&self) -> Option<Point> {
        self.placement.center()
    }

    pub fn is_fixed(&self) -> bool {
        self.placement.is_fixed()
    }
}

/// A terminal of a box
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BpcPin {
    pub box_id: BoxId,
    pub pin_id: PinId,
    pub network_id: NetworkId,
    pub color: Color,
    /// Offset relative to the owning box's centre
    pub offset: Point,
}

impl BpcPin {
    pub fn new(
        box_id: impl Into<BoxId>,
        pin_id: impl Into<PinId>,
        network_id: impl Into<NetworkId>,
        color: impl Into<Color>,
    ) -> Self {
        Self {
            box_id: box_id.into(),
            pin_id: pin_id.into(),
            network_id: network_id.into(),
            color: color.into(),
            offset: Point::default(),
        }
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.offset = Point::new(x, y);
        self
    }

    pub fn key(&self) -> PinKey {
        PinKey::new(self.box_id.clone(), self.pin_id.clone())
    }

    /// Structural centre markers are not real terminals.
    pub fn is_center(&self) -> bool {
        self.color.is_center()
    }
}

/// Graph-wide identity of a pin
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinKey {
    pub box_id: BoxId,
    pub pin_id: PinId,
}

impl PinKey {
    pub fn new(box_id: impl Into<BoxId>, pin_id: impl Into<PinId>) -> Self {
        Self {
            box_id: box_id.into(),
            pin_id: pin_id.into(),
        }
    }
}

impl fmt::Display for PinKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.box_id, self.pin_id)
    }
}

/// Axis-aligned extent of a box's real pins, relative to its centre
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl Bounds {
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    fn include(&mut self, p: &Point) {
        self.min_x = self.min_x.min(p.x);
        self.max_x = self.max_x.max(p.x);
        self.min_y = self.min_y.min(p.y);
        self.max_y = self.max_y.max(p.y);
    }
}

/// One circuit or one corpus template
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BpcGraph {
    #[serde(default)]
    pub boxes: Vec<BpcBox>,
    #[serde(default)]
    pub pins: Vec<BpcPin>,
}

impl BpcGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_box(mut self, bx: BpcBox) -> Self {
        self.boxes.push(bx);
        self
    }

    pub fn with_pin(mut self, pin: BpcPin) -> Self {
        self.pins.push(pin);
        self
    }

    pub fn add_box(&mut self, bx: BpcBox) {
        self.boxes.push(bx);
    }

    pub fn add_pin(&mut self, pin: BpcPin) {
        self.pins.push(pin);
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty() && self.pins.is_empty()
    }

    /// Check referential integrity: unique box ids, unique pin ids per box,
    /// and every pin owned by an existing box.
    pub fn validate(&self) -> Result<()> {
        let mut box_ids = BTreeSet::new();
        for bx in &self.boxes {
            if !box_ids.insert(&bx.box_id) {
                return Err(SchemalignError::DuplicateBox(bx.box_id.clone()));
            }
        }

        let mut pin_keys = BTreeSet::new();
        for pin in &self.pins {
            if !box_ids.contains(&pin.box_id) {
                return Err(SchemalignError::MissingBox {
                    box_id: pin.box_id.clone(),
                    pin_id: pin.pin_id.clone(),
                });
            }
            if !pin_keys.insert(pin.key()) {
                return Err(SchemalignError::DuplicatePin(pin.key()));
            }
        }

        Ok(())
    }

    pub fn get_box(&self, box_id: &BoxId) -> Option<&BpcBox> {
        self.boxes.iter().find(|b| &b.box_id == box_id)
    }

    pub fn get_box_mut(&mut self, box_id: &BoxId) -> Option<&mut BpcBox> {
        self.boxes.iter_mut().find(|b| &b.box_id == box_id)
    }

    /// Box lookup that fails with [`SchemalignError::UnknownBox`].
    pub fn require_box(&self, box_id: &BoxId) -> Result<&BpcBox> {
        self.get_box(box_id)
            .ok_or_else(|| SchemalignError::UnknownBox(box_id.clone()))
    }

    pub fn contains_box(&self, box_id: &BoxId) -> bool {
        self.get_box(box_id).is_some()
    }

    pub fn get_pin(&self, key: &PinKey) -> Option<&BpcPin> {
        self.pins
            .iter()
            .find(|p| p.box_id == key.box_id && p.pin_id == key.pin_id)
    }

    pub fn pins_of_box<'a>(&'a self, box_id: &BoxId) -> impl Iterator<Item = &'a BpcPin> + 'a {
        let box_id = box_id.clone();
        self.pins.iter().filter(move |p| p.box_id == box_id)
    }

    /// Pins of a box excluding centre markers
    pub fn real_pins_of_box<'a>(&'a self, box_id: &BoxId) -> impl Iterator<Item = &'a BpcPin> + 'a {
        self.pins_of_box(box_id).filter(|p| !p.is_center())
    }

    /// Network id → indices into `self.pins`, in pin order.
    pub fn networks(&self) -> BTreeMap<NetworkId, Vec<usize>> {
        let mut networks: BTreeMap<NetworkId, Vec<usize>> = BTreeMap::new();
        for (i, pin) in self.pins.iter().enumerate() {
            networks.entry(pin.network_id.clone()).or_default().push(i);
        }
        networks
    }

    pub fn network_ids(&self) -> BTreeSet<NetworkId> {
        self.pins.iter().map(|p| p.network_id.clone()).collect()
    }

    /// Extent of the real pins of a box; `None` for a box without real pins.
    pub fn box_bounds(&self, box_id: &BoxId) -> Option<Bounds> {
        let mut pins = self.real_pins_of_box(box_id);
        let first = pins.next()?;
        let mut bounds = Bounds {
            min_x: first.offset.x,
            max_x: first.offset.x,
            min_y: first.offset.y,
            max_y: first.offset.y,
        };
        for pin in pins {
            bounds.include(&pin.offset);
        }
        Some(bounds)
    }

    /// Absolute position of a pin: owning box centre (origin if unknown) plus offset.
    pub fn pin_position(&self, pin: &BpcPin) -> Point {
        let center = self
            .get_box(&pin.box_id)
            .and_then(|b| b.center())
            .unwrap_or_default();
        center.plus(&pin.offset)
    }

    /// The boxes in `box_ids` together with all of their pins, in graph order.
    pub fn subgraph(&self, box_ids: &BTreeSet<BoxId>) -> BpcGraph {
        BpcGraph {
            boxes: self
                .boxes
                .iter()
                .filter(|b| box_ids.contains(&b.box_id))
                .cloned()
                .collect(),
            pins: self
                .pins
                .iter()
                .filter(|p| box_ids.contains(&p.box_id))
                .cloned()
                .collect(),
        }
    }

    /// Re-join networks split by renetworking, following `origins`
    /// (minted id → original id) until an unsplit id is reached.
    pub fn merge_networks(&mut self, origins: &BTreeMap<NetworkId, NetworkId>) {
        for pin in &mut self.pins {
            let mut hops = 0;
            while let Some(original) = origins.get(&pin.network_id) {
                pin.network_id = original.clone();
                hops += 1;
                if hops > origins.len() {
                    break;
                }
            }
        }
    }

    pub fn stats(&self) -> GraphStats {
        let fixed_boxes = self.boxes.iter().filter(|b| b.is_fixed()).count();
        GraphStats {
            box_count: self.boxes.len(),
            pin_count: self.pins.len(),
            network_count: self.network_ids().len(),
            fixed_boxes,
            floating_boxes: self.boxes.len() - fixed_boxes,
        }
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Read and validate a graph from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let graph = Self::from_json(&content)?;
        graph.validate()?;
        Ok(graph)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json_pretty()?)?;
        Ok(())
    }
}

/// Statistics about a graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub box_count: usize,
    pub pin_count: usize,
    pub network_count: usize,
    pub fixed_boxes: usize,
    pub floating_boxes: usize,
}
