use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::classfile::LocalVariable;
use crate::descriptor::{Type, split_method_descriptor};

/// Method parameter; `name` is empty when debug info was stripped.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub(crate) struct MethodParam {
    pub(crate) name: String,
    #[serde(rename = "type")]
    pub(crate) ty: Type,
}

/// Parameters in declaration order plus the local slot each one starts at.
#[derive(Debug)]
pub(crate) struct ParamLayout {
    pub(crate) params: Vec<MethodParam>,
    /// Slot index (excluding `this`) to position in `params`.
    pub(crate) slots: BTreeMap<u16, usize>,
}

/// Decode the parameter list of a method descriptor and assign local slots.
pub(crate) fn parse_param_layout(descriptor: &str) -> Result<ParamLayout> {
    let (section, _) = split_method_descriptor(descriptor)?;
    let bytes = section.as_bytes();
    let mut params = Vec::new();
    let mut slots = BTreeMap::new();
    let mut next_slot = 0u16;
    let mut cursor = 0usize;

    while cursor < bytes.len() {
        let start = cursor;
        while bytes[cursor] == b'[' {
            cursor += 1;
            if cursor == bytes.len() {
                anyhow::bail!("array without element type in {descriptor}");
            }
        }
        let end = if bytes[cursor] == b'L' {
            // The terminator is searched from the current cursor, after any array prefix.
            let terminator = section[cursor..]
                .find(';')
                .with_context(|| format!("unterminated class type in {descriptor}"))?;
            cursor + terminator + 1
        } else {
            let code = section[cursor..]
                .chars()
                .next()
                .with_context(|| format!("truncated parameter in {descriptor}"))?;
            cursor + code.len_utf8()
        };

        let ty = Type::decode(&section[start..end])
            .with_context(|| format!("decode parameter {} of {descriptor}", params.len()))?;
        slots.insert(next_slot, params.len());
        next_slot = next_slot.saturating_add(ty.slot_width());
        params.push(MethodParam {
            name: String::new(),
            ty,
        });
        cursor = end;
    }

    Ok(ParamLayout { params, slots })
}

/// Build the ordered parameter list, naming parameters from the local variable table.
///
/// Only entries that start at pc 0 and are not `this` are treated as parameters.
/// Instance methods reserve slot 0 for `this`, so their slots are shifted down by one.
pub(crate) fn synthesize_params(
    descriptor: &str,
    local_variables: Option<&[LocalVariable]>,
    is_static: bool,
) -> Result<Vec<MethodParam>> {
    let ParamLayout { mut params, slots } = parse_param_layout(descriptor)?;
    let Some(local_variables) = local_variables else {
        return Ok(params);
    };

    for variable in local_variables {
        if variable.name == "this" || variable.start_pc != 0 {
            continue;
        }
        let slot = if is_static {
            Some(variable.index)
        } else {
            variable.index.checked_sub(1)
        };
        let Some(position) = slot.and_then(|slot| slots.get(&slot)) else {
            continue;
        };
        params[*position].name = variable.name.clone();
    }

    Ok(params)
}
