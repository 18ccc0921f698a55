use std::collections::HashMap;
use std::fmt;
use std::sync::{LazyLock, RwLock};

use crate::boxes::AnyBox;
use crate::types::BoxType;

/// Registered definition of one box type: a template value to decode into
/// and the set of permitted FullBox versions.
pub struct BoxDef {
    template: Box<dyn AnyBox>,
    versions: Vec<u8>,
}

impl BoxDef {
    /// An empty version set accepts any version.
    pub fn is_supported_version(&self, version: u8) -> bool {
        self.versions.is_empty() || self.versions.contains(&version)
    }

    pub fn versions(&self) -> &[u8] {
        &self.versions
    }

    /// Fresh value to decode into, cloned from the template.
    pub fn new_box(&self) -> Box<dyn AnyBox> {
        self.template.clone_box()
    }
}

impl Clone for BoxDef {
    fn clone(&self) -> Self {
        Self {
            template: self.template.clone_box(),
            versions: self.versions.clone(),
        }
    }
}

impl fmt::Debug for BoxDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoxDef")
            .field("type", &self.template.get_type())
            .field("versions", &self.versions)
            .finish()
    }
}

// Populated at startup, read-only on codec hot paths.
static REGISTRY: LazyLock<RwLock<HashMap<BoxType, BoxDef>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

/// Register `template` under its own box type.
///
/// An empty `versions` slice accepts any version. Registering the same type
/// again overwrites the previous definition. All registrations must complete
/// before concurrent marshalling or unmarshalling starts.
pub fn add_box_def<B: AnyBox + 'static>(template: B, versions: &[u8]) {
    let typ = template.get_type();
    REGISTRY.write().unwrap().insert(
        typ,
        BoxDef {
            template: Box::new(template),
            versions: versions.to_vec(),
        },
    );
}

/// Look up the definition registered for `typ`.
pub fn get_box_def(typ: BoxType) -> Option<BoxDef> {
    REGISTRY.read().unwrap().get(&typ).cloned()
}
