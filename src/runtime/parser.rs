//! Command interpretation.
//!
//! Turns a line of player input into an [`Interpretation`]: which action it
//! selects and what the action applies to. Action names are matched as the
//! longest word prefix of the input; objects are resolved by the dynamic
//! name overlay among the objects the current player can reach.

use crate::context::ownership::normalize_name;
use crate::context::OwnershipMap;
use crate::module::{ActionDef, ActionType, ElementId, ElementKind, Module};

#[derive(Debug, Clone, PartialEq)]
pub enum Interpretation {
    /// No action name matched.
    Unknown,
    /// The action matched but the rest of the line did not make sense.
    Malformed(ElementId),
    /// The action needs more words.
    Incomplete(ElementId),
    /// An object phrase matched several reachable objects.
    Ambiguous(ElementId),
    General(ElementId),
    Open(ElementId, String),
    Modal(ElementId, String),
    Transitive(ElementId, ElementId),
    Ditransitive(ElementId, ElementId, ElementId),
}

impl Interpretation {
    pub fn action(&self) -> Option<ElementId> {
        match self {
            Interpretation::Unknown => None,
            Interpretation::Malformed(a)
            | Interpretation::Incomplete(a)
            | Interpretation::Ambiguous(a)
            | Interpretation::General(a)
            | Interpretation::Open(a, _)
            | Interpretation::Modal(a, _)
            | Interpretation::Transitive(a, _)
            | Interpretation::Ditransitive(a, _, _) => Some(*a),
        }
    }
}

/// Outcome of resolving one object phrase.
#[derive(Debug, Clone, PartialEq)]
enum ResolveResult {
    Found(ElementId),
    Ambiguous,
    NotFound,
}

fn words(text: &str) -> Vec<String> {
    normalize_name(text)
        .split(' ')
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

fn starts_with(input: &[String], prefix: &[String]) -> bool {
    !prefix.is_empty() && input.len() >= prefix.len() && input[..prefix.len()] == *prefix
}

/// Objects the current player can refer to: their own, then the current
/// room's, then the world's.
pub fn accessible_objects(module: &Module, ownership: &OwnershipMap) -> Vec<ElementId> {
    let mut owners = Vec::new();
    if let Some(player) = ownership.current_player() {
        owners.push(player);
    }
    if let Some(room) = ownership.current_room() {
        owners.push(room);
    }
    owners.push(module.world());

    let mut out: Vec<ElementId> = Vec::new();
    for owner in owners {
        for object in ownership.objects_owned_by(owner) {
            if !out.contains(&object) {
                out.push(object);
            }
        }
    }
    out
}

fn resolve(ownership: &OwnershipMap, candidates: &[ElementId], phrase: &[String]) -> ResolveResult {
    let matches = ownership.objects_with_name(candidates, &phrase.join(" "));
    match matches.as_slice() {
        [] => ResolveResult::NotFound,
        [one] => ResolveResult::Found(*one),
        _ => ResolveResult::Ambiguous,
    }
}

/// Pick the action whose name is the longest prefix of `input`; ties go to
/// the earlier action in module order.
fn match_action<'m>(module: &'m Module, input: &[String]) -> Option<(ElementId, &'m ActionDef, usize)> {
    let mut best: Option<(ElementId, &ActionDef, usize)> = None;
    for element in module.elements_of_kind(ElementKind::Action) {
        if element.is_archetype() {
            continue;
        }
        let Some(def) = element.action() else {
            continue;
        };
        for name in &def.names {
            let name_words = words(name);
            if starts_with(input, &name_words)
                && best.map_or(true, |(_, _, len)| name_words.len() > len)
            {
                best = Some((element.id(), def, name_words.len()));
            }
        }
    }
    best
}

pub fn interpret(module: &Module, ownership: &OwnershipMap, text: &str) -> Interpretation {
    let input = words(text);
    let Some((action, def, used)) = match_action(module, &input) else {
        return Interpretation::Unknown;
    };
    let rest = &input[used..];

    match def.action_type {
        ActionType::General => {
            if rest.is_empty() {
                Interpretation::General(action)
            } else {
                Interpretation::Malformed(action)
            }
        }
        ActionType::Open => Interpretation::Open(action, rest.join(" ")),
        ActionType::Modal => {
            if rest.is_empty() {
                return Interpretation::Incomplete(action);
            }
            let mode = rest.join(" ");
            match def.extra_strings.iter().find(|m| normalize_name(m) == mode) {
                Some(declared) => Interpretation::Modal(action, declared.clone()),
                None => Interpretation::Malformed(action),
            }
        }
        ActionType::Transitive => {
            let candidates = accessible_objects(module, ownership);
            transitive(ownership, &candidates, action, rest)
        }
        ActionType::Ditransitive => {
            let candidates = accessible_objects(module, ownership);
            ditransitive(ownership, &candidates, action, def, rest)
        }
    }
}

fn transitive(
    ownership: &OwnershipMap,
    candidates: &[ElementId],
    action: ElementId,
    phrase: &[String],
) -> Interpretation {
    if phrase.is_empty() {
        return Interpretation::Incomplete(action);
    }
    match resolve(ownership, candidates, phrase) {
        ResolveResult::Found(object) => Interpretation::Transitive(action, object),
        ResolveResult::Ambiguous => Interpretation::Ambiguous(action),
        ResolveResult::NotFound => Interpretation::Malformed(action),
    }
}

fn ditransitive(
    ownership: &OwnershipMap,
    candidates: &[ElementId],
    action: ElementId,
    def: &ActionDef,
    rest: &[String],
) -> Interpretation {
    let conjunctions: Vec<Vec<String>> = def.extra_strings.iter().map(|c| words(c)).collect();
    let split = (0..rest.len()).find_map(|i| {
        conjunctions
            .iter()
            .find(|c| starts_with(&rest[i..], c))
            .map(|c| (i, c.len()))
    });

    let (left, right) = match split {
        Some((at, len)) => (&rest[..at], &rest[at + len..]),
        None => (rest, &rest[rest.len()..]),
    };
    if left.is_empty() {
        return Interpretation::Incomplete(action);
    }
    if right.is_empty() {
        if def.strict {
            return Interpretation::Incomplete(action);
        }
        return transitive(ownership, candidates, action, left);
    }

    let first = match resolve(ownership, candidates, left) {
        ResolveResult::Found(object) => object,
        ResolveResult::Ambiguous => return Interpretation::Ambiguous(action),
        ResolveResult::NotFound => return Interpretation::Malformed(action),
    };
    let second = match resolve(ownership, candidates, right) {
        ResolveResult::Found(object) => object,
        ResolveResult::Ambiguous => return Interpretation::Ambiguous(action),
        ResolveResult::NotFound => return Interpretation::Malformed(action),
    };
    if def.reversed {
        Interpretation::Ditransitive(action, second, first)
    } else {
        Interpretation::Ditransitive(action, first, second)
    }
}
