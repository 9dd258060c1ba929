//! Client-side view of node and edge schemas.

use graphlane_interfaces::{DbType, PropertyDef, PropertyType, SchemaDef};
use serde::{Deserialize, Serialize};

/// Names of the built-in identity columns. They travel as dedicated row
/// fields and are never serialized as property values.
pub const IDENTITY_PROPERTIES: [&str; 6] = ["_id", "_uuid", "_from", "_to", "_from_uuid", "_to_uuid"];

/// How a property takes part in inserts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyKind {
    /// Built-in identity column
    Identity,
    /// Declared but skipped by inserts
    Ignored,
    /// Serialized from row values
    Regular,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub property_type: PropertyType,
    pub kind: PropertyKind,
}

impl Property {
    /// A property whose kind follows from its name
    pub fn new(name: impl Into<String>, property_type: PropertyType) -> Self {
        let name = name.into();
        let kind = if IDENTITY_PROPERTIES.contains(&name.as_str()) {
            PropertyKind::Identity
        } else {
            PropertyKind::Regular
        };
        Self {
            name,
            property_type,
            kind,
        }
    }

    /// Whether every inserted row must carry a value for this property
    pub fn is_required(&self) -> bool {
        self.kind == PropertyKind::Regular
    }

    fn to_wire(&self) -> PropertyDef {
        PropertyDef {
            name: self.name.clone(),
            property_type: self.property_type,
            ignored: self.kind == PropertyKind::Ignored,
        }
    }
}

/// A named schema and its ordered property list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub db_type: DbType,
    pub properties: Vec<Property>,
}

impl Schema {
    pub fn new(name: impl Into<String>, db_type: DbType) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            db_type,
            properties: Vec::new(),
        }
    }

    /// Appends a property
    pub fn with_property(mut self, name: impl Into<String>, property_type: PropertyType) -> Self {
        self.properties.push(Property::new(name, property_type));
        self
    }

    /// Marks an existing property as skipped by inserts
    pub fn ignore(mut self, name: &str) -> Self {
        if let Some(property) = self.properties.iter_mut().find(|p| p.name == name) {
            if property.kind == PropertyKind::Regular {
                property.kind = PropertyKind::Ignored;
            }
        }
        self
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Properties every row must supply, in declaration order
    pub fn required_properties(&self) -> impl Iterator<Item = &Property> {
        self.properties.iter().filter(|p| p.is_required())
    }

    /// Header sent in front of an insert table: the required properties, in
    /// the order row values are serialized.
    pub fn to_wire_header(&self) -> SchemaDef {
        SchemaDef {
            name: self.name.clone(),
            description: self.description.clone(),
            properties: self.required_properties().map(Property::to_wire).collect(),
        }
    }

    /// Builds a schema from a catalog entry
    pub fn from_wire(def: SchemaDef, db_type: DbType) -> Self {
        let properties = def
            .properties
            .into_iter()
            .map(|p| {
                let mut property = Property::new(p.name, p.property_type);
                if p.ignored && property.kind == PropertyKind::Regular {
                    property.kind = PropertyKind::Ignored;
                }
                property
            })
            .collect();
        Self {
            name: def.name,
            description: def.description,
            db_type,
            properties,
        }
    }
}
