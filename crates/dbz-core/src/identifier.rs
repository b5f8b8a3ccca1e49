//! Hierarchical identifiers for databases, entity types, zones and entities.
//!
//! Every identifier renders as its components joined by `/`, e.g.
//! `my-db/contacts/default/1234`, and parses back from that form. Inside a
//! component `~` renders as `~0` and `/` as `~1`, the same escaping paths
//! use.

use std::fmt;
use std::hash::Hash;

use dbz_path::{escape_segment, unescape_segment};

/// Zone used when an entity is created without naming one.
pub const DEFAULT_ZONE: &str = "default";

/// Common behaviour of the identifier family.
pub trait Identifier: Clone + fmt::Debug + fmt::Display + Eq + Hash + Send + Sync + 'static {
    /// The identifier's components, outermost first.
    fn components(&self) -> Vec<&str>;

    /// Builds an identifier from exactly the right number of components.
    fn from_components(components: &[&str]) -> Option<Self>;

    fn database_id(&self) -> DatabaseId;

    /// Parses the `/`-joined form, resolving escapes in each component.
    fn parse(text: &str) -> Option<Self> {
        let components: Vec<String> = text.split('/').map(unescape_segment).collect();
        if components.iter().any(String::is_empty) {
            return None;
        }
        let components: Vec<&str> = components.iter().map(String::as_str).collect();
        Self::from_components(&components)
    }

    /// False when a component is empty. Such an identifier has no textual
    /// form that parses back, so it cannot travel in a message.
    fn is_valid(&self) -> bool {
        self.components().iter().all(|c| !c.is_empty())
    }

    /// True if `scope`'s components are a prefix of this identifier's.
    /// Every identifier is in itself.
    ///
    /// ```
    /// use dbz_core::identifier::{DatabaseId, Identifier};
    ///
    /// let db = DatabaseId::new("db");
    /// let contacts = db.entity_type("contacts");
    /// let id = contacts.entity("42");
    /// assert!(id.is_in(&db));
    /// assert!(id.is_in(&contacts));
    /// assert!(!id.is_in(&DatabaseId::new("other")));
    /// ```
    fn is_in<S: Identifier>(&self, scope: &S) -> bool {
        let mine = self.components();
        let theirs = scope.components();
        theirs.len() <= mine.len() && mine.iter().zip(&theirs).all(|(a, b)| a == b)
    }
}

fn write_components(f: &mut fmt::Formatter<'_>, components: &[&str]) -> fmt::Result {
    for (i, component) in components.iter().enumerate() {
        if i > 0 {
            f.write_str("/")?;
        }
        f.write_str(&escape_segment(component))?;
    }
    Ok(())
}

// ── DatabaseId ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DatabaseId {
    name: String,
}

impl DatabaseId {
    pub fn new(name: impl Into<String>) -> DatabaseId {
        DatabaseId { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entity_type(&self, name: impl Into<String>) -> EntityType {
        EntityType {
            database: self.clone(),
            name: name.into(),
        }
    }
}

impl Identifier for DatabaseId {
    fn components(&self) -> Vec<&str> {
        vec![self.name.as_str()]
    }

    fn from_components(components: &[&str]) -> Option<DatabaseId> {
        match components {
            [name] => Some(DatabaseId::new(*name)),
            _ => None,
        }
    }

    fn database_id(&self) -> DatabaseId {
        self.clone()
    }
}

impl fmt::Display for DatabaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_components(f, &self.components())
    }
}

// ── EntityType ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityType {
    database: DatabaseId,
    name: String,
}

impl EntityType {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn zone(&self, zone: impl Into<String>) -> ZoneId {
        ZoneId {
            entity_type: self.clone(),
            zone: zone.into(),
        }
    }

    pub fn default_zone(&self) -> ZoneId {
        self.zone(DEFAULT_ZONE)
    }

    /// An entity of this type in the default zone.
    pub fn entity(&self, id: impl Into<String>) -> EntityId {
        self.default_zone().entity(id)
    }
}

impl Identifier for EntityType {
    fn components(&self) -> Vec<&str> {
        vec![self.database.name.as_str(), self.name.as_str()]
    }

    fn from_components(components: &[&str]) -> Option<EntityType> {
        match components {
            [db, name] => Some(DatabaseId::new(*db).entity_type(*name)),
            _ => None,
        }
    }

    fn database_id(&self) -> DatabaseId {
        self.database.clone()
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_components(f, &self.components())
    }
}

// ── ZoneId ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ZoneId {
    entity_type: EntityType,
    zone: String,
}

impl ZoneId {
    pub fn entity_type(&self) -> &EntityType {
        &self.entity_type
    }

    pub fn zone(&self) -> &str {
        &self.zone
    }

    pub fn entity(&self, id: impl Into<String>) -> EntityId {
        EntityId {
            zone: self.clone(),
            id: id.into(),
        }
    }
}

impl Identifier for ZoneId {
    fn components(&self) -> Vec<&str> {
        let mut components = self.entity_type.components();
        components.push(self.zone.as_str());
        components
    }

    fn from_components(components: &[&str]) -> Option<ZoneId> {
        match components {
            [db, kind, zone] => Some(DatabaseId::new(*db).entity_type(*kind).zone(*zone)),
            _ => None,
        }
    }

    fn database_id(&self) -> DatabaseId {
        self.entity_type.database_id()
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_components(f, &self.components())
    }
}

// ── EntityId ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId {
    zone: ZoneId,
    id: String,
}

impl EntityId {
    pub fn entity_type(&self) -> &EntityType {
        &self.zone.entity_type
    }

    pub fn zone_id(&self) -> &ZoneId {
        &self.zone
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Identifier for EntityId {
    fn components(&self) -> Vec<&str> {
        let mut components = self.zone.components();
        components.push(self.id.as_str());
        components
    }

    fn from_components(components: &[&str]) -> Option<EntityId> {
        match components {
            [db, kind, zone, id] => Some(
                DatabaseId::new(*db)
                    .entity_type(*kind)
                    .zone(*zone)
                    .entity(*id),
            ),
            _ => None,
        }
    }

    fn database_id(&self) -> DatabaseId {
        self.zone.database_id()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_components(f, &self.components())
    }
}
