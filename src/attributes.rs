use std::collections::BTreeMap;

use anyhow::{Context, Result};

use crate::classfile::RawAttribute;
use crate::constant_pool::ConstantPool;

type Handler<'h> = Box<dyn FnMut(&[u8]) -> Result<()> + 'h>;

/// Attribute handlers keyed by attribute name.
///
/// Attributes without a registered handler are skipped, so class files carrying
/// `Exceptions`, `Signature`, `Deprecated` and friends pass through untouched.
pub(crate) struct AttributeHandlers<'h> {
    handlers: BTreeMap<&'static str, Handler<'h>>,
}

impl<'h> AttributeHandlers<'h> {
    pub(crate) fn new() -> Self {
        Self {
            handlers: BTreeMap::new(),
        }
    }

    pub(crate) fn on(
        mut self,
        name: &'static str,
        handler: impl FnMut(&[u8]) -> Result<()> + 'h,
    ) -> Self {
        self.handlers.insert(name, Box::new(handler));
        self
    }

    /// Run the matching handler for every attribute, in attribute order.
    pub(crate) fn dispatch(
        &mut self,
        constant_pool: &ConstantPool,
        attributes: &[RawAttribute],
    ) -> Result<()> {
        for attribute in attributes {
            let Some(name) = constant_pool.resolve_string(attribute.name_index) else {
                continue;
            };
            let Some(handler) = self.handlers.get_mut(name.as_str()) else {
                continue;
            };
            handler(&attribute.info).with_context(|| format!("decode {name} attribute"))?;
        }
        Ok(())
    }
}
