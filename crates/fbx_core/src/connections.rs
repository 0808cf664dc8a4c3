//! Object connection graph.
//!
//! FBX objects reference each other only through the `Connections` section.
//! This index maps every object ID to its labeled parent and child edges,
//! keeping document order and duplicates.

use std::collections::HashMap;

use crate::document::RawConnection;

/// One labeled edge seen from one endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Relationship {
    pub id: i64,
    pub label: String,
}

/// Edges incident to one object.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObjectConnections {
    pub parents: Vec<Relationship>,
    pub children: Vec<Relationship>,
}

/// Bidirectional adjacency index over object IDs.
#[derive(Clone, Debug, Default)]
pub struct ConnectionGraph {
    objects: HashMap<i64, ObjectConnections>,
}

impl ConnectionGraph {
    /// Build the graph from `(child, parent, label)` triples.
    pub fn build(connections: &[RawConnection]) -> Self {
        let mut objects: HashMap<i64, ObjectConnections> = HashMap::new();
        for conn in connections {
            objects.entry(conn.child).or_default().parents.push(Relationship {
                id: conn.parent,
                label: conn.label.clone(),
            });
            objects.entry(conn.parent).or_default().children.push(Relationship {
                id: conn.child,
                label: conn.label.clone(),
            });
        }
        log::debug!("Connection graph covers {} objects", objects.len());
        Self { objects }
    }

    pub fn get(&self, id: i64) -> Option<&ObjectConnections> {
        self.objects.get(&id)
    }

    pub fn contains(&self, id: i64) -> bool {
        self.objects.contains_key(&id)
    }

    /// Parent edges of `id`, empty when the object is unconnected.
    pub fn parents(&self, id: i64) -> &[Relationship] {
        self.objects
            .get(&id)
            .map(|c| c.parents.as_slice())
            .unwrap_or(&[])
    }

    /// Child edges of `id`, empty when the object is unconnected.
    pub fn children(&self, id: i64) -> &[Relationship] {
        self.objects
            .get(&id)
            .map(|c| c.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
