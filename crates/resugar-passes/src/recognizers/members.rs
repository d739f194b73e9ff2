// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Member-level recognizers: automatic properties and events, destructors,
//! and decimal-constant folding.
//!
//! These are single-pattern rewrites over declaration nodes. The property
//! and event recognizers strip compiler-generated accessor bodies, mark the
//! declaration `auto`, delete the backing field from the enclosing type, and
//! redirect any surviving backing-field references to the member name.

use std::sync::LazyLock;

use resugar_match::{match_node, pat, Pattern};
use resugar_tree::{Arena, Literal, NodeId, NodeKind, Role, UnaryOperator};
use tracing::debug;

use crate::context::PassContext;
use crate::env::is_mangled;
use crate::error::PassResult;
use crate::recognizers::{Recognizer, Rewrite};

// ----------------------------------------------------------------------
// Shared helpers
// ----------------------------------------------------------------------

/// A backing-field access: `this.f` or a bare `f`.
fn backing_access() -> Pattern {
    Pattern::choice(vec![pat::member_any(pat::this()), pat::ident_any()])
}

/// Field name out of a matched backing access.
fn backing_name(arena: &Arena, node: NodeId) -> Option<String> {
    match arena.kind(node) {
        NodeKind::Identifier { name } => Some(name.clone()),
        NodeKind::MemberAccess { member } => {
            let target = arena.child(node, Role::Target)?;
            matches!(arena.kind(target), NodeKind::ThisRef).then(|| member.clone())
        }
        _ => None,
    }
}

fn enclosing_type(arena: &Arena, node: NodeId) -> Option<NodeId> {
    let mut cur = arena.parent(node);
    while let Some(id) = cur {
        if matches!(arena.kind(id), NodeKind::TypeDeclaration { .. }) {
            return Some(id);
        }
        cur = arena.parent(id);
    }
    None
}

/// The backing FieldDeclaration sibling, required and initializer-free.
fn find_backing_field(arena: &Arena, ty_decl: NodeId, field: &str) -> Option<NodeId> {
    arena
        .children(ty_decl)
        .iter()
        .map(|c| c.id)
        .find(|&id| matches!(arena.kind(id), NodeKind::FieldDeclaration { name, .. } if name == field))
        .filter(|&id| arena.child(id, Role::Initializer).is_none())
}

/// Point surviving references at the recovered member.
fn redirect_backing_refs(arena: &mut Arena, ty_decl: NodeId, field: &str, member: &str) {
    let targets: Vec<NodeId> = arena
        .descendants(ty_decl)
        .into_iter()
        .filter(|&id| match arena.kind(id) {
            NodeKind::Identifier { name } => name == field,
            NodeKind::MemberAccess { member } => member == field,
            _ => false,
        })
        .collect();
    for id in targets {
        match arena.kind_mut(id) {
            NodeKind::Identifier { name } | NodeKind::MemberAccess { member: name } => {
                *name = member.to_string();
            }
            _ => {}
        }
    }
}

fn static_callee<'a>(arena: &'a Arena, invocation: NodeId) -> Option<(&'a str, &'a str)> {
    let callee = arena.child(invocation, Role::Callee)?;
    let NodeKind::MemberAccess { member } = arena.kind(callee) else {
        return None;
    };
    let target = arena.child(callee, Role::Target)?;
    let NodeKind::TypeRef { ty } = arena.kind(target) else {
        return None;
    };
    Some((ty, member))
}

// ----------------------------------------------------------------------
// Automatic properties
// ----------------------------------------------------------------------

/// `get { return this.<P>k__BackingField; }` + the matching setter collapse
/// to an auto-property, and the backing field disappears.
pub struct AutoProperty;

static GETTER_BODY: LazyLock<Pattern> = LazyLock::new(|| {
    pat::block(vec![pat::return_stmt(Pattern::capture(
        "backing",
        backing_access(),
    ))])
});

static SETTER_BODY: LazyLock<Pattern> = LazyLock::new(|| {
    pat::block(vec![pat::assign_stmt(
        Pattern::capture("backing", backing_access()),
        pat::ident("value"),
    )])
});

impl Recognizer for AutoProperty {
    fn name(&self) -> &'static str {
        "auto-property"
    }

    fn applies_to(&self, kind: &NodeKind) -> bool {
        matches!(kind, NodeKind::PropertyDeclaration { auto: false, .. })
    }

    fn try_rewrite(&self, cx: &mut PassContext<'_>, node: NodeId) -> PassResult<Rewrite> {
        let arena = &mut *cx.arena;
        let NodeKind::PropertyDeclaration { name, auto: false } = arena.kind(node) else {
            return Ok(Rewrite::Declined);
        };
        let prop_name = name.clone();

        let Some(getter) = arena.child(node, Role::Getter) else {
            return Ok(Rewrite::Declined);
        };
        let Some(getter_body) = arena.child(getter, Role::Body) else {
            return Ok(Rewrite::Declined);
        };
        let Some(caps) = match_node(arena, &GETTER_BODY, getter_body) else {
            return Ok(Rewrite::Declined);
        };
        let Some(field) = caps.get_one("backing").and_then(|n| backing_name(arena, n)) else {
            return Ok(Rewrite::Declined);
        };
        // Only compiler-synthesized fields qualify; a getter that happens to
        // return an ordinary field is real code.
        if !is_mangled(&field) {
            return Ok(Rewrite::Declined);
        }

        let setter = arena.child(node, Role::Setter);
        let mut setter_body = None;
        if let Some(setter) = setter {
            let Some(body) = arena.child(setter, Role::Body) else {
                return Ok(Rewrite::Declined);
            };
            let Some(caps) = match_node(arena, &SETTER_BODY, body) else {
                return Ok(Rewrite::Declined);
            };
            if caps.get_one("backing").and_then(|n| backing_name(arena, n)) != Some(field.clone()) {
                return Ok(Rewrite::Declined);
            }
            setter_body = Some(body);
        }

        let Some(ty_decl) = enclosing_type(arena, node) else {
            return Ok(Rewrite::Declined);
        };
        let Some(field_decl) = find_backing_field(arena, ty_decl, &field) else {
            return Ok(Rewrite::Declined);
        };

        debug!(property = %prop_name, %field, "recovering auto-property");
        arena.detach(getter_body);
        arena.absorb_subtree_provenance(getter_body, node);
        if let Some(body) = setter_body {
            arena.detach(body);
            arena.absorb_subtree_provenance(body, node);
        }
        arena.detach(field_decl);
        arena.absorb_subtree_provenance(field_decl, node);
        if let NodeKind::PropertyDeclaration { auto, .. } = arena.kind_mut(node) {
            *auto = true;
        }
        redirect_backing_refs(arena, ty_decl, &field, &prop_name);
        Ok(Rewrite::Applied(node))
    }
}

// ----------------------------------------------------------------------
// Automatic events
// ----------------------------------------------------------------------

/// Recovers `event EventHandler E;` from the two accessor lowerings: the
/// plain `this.E = (T)Delegate.Combine(this.E, value);` form and the
/// interlocked compare-exchange retry loop.
pub struct AutoEvent;

fn combine_body(method: &str) -> Pattern {
    let call = pat::invoke(
        pat::static_member("Delegate", method),
        vec![Pattern::backref("field"), pat::ident("value")],
    );
    pat::block(vec![pat::assign_stmt(
        Pattern::capture("field", backing_access()),
        Pattern::choice(vec![pat::cast_any(call.clone()), call]),
    )])
}

static ADD_BODY: LazyLock<Pattern> = LazyLock::new(|| combine_body("Combine"));
static REMOVE_BODY: LazyLock<Pattern> = LazyLock::new(|| combine_body("Remove"));

/// The retry-loop lowering: a do/while containing
/// `Interlocked.CompareExchange(ref this.E, ..)` and a `Delegate.<method>`
/// call. Returns the backing-field name.
fn compare_exchange_field(arena: &Arena, body: NodeId, method: &str) -> Option<String> {
    let do_while = arena
        .descendants(body)
        .into_iter()
        .find(|&id| matches!(arena.kind(id), NodeKind::DoWhile))?;
    let mut field = None;
    let mut saw_combine = false;
    for id in arena.descendants(do_while) {
        if !matches!(arena.kind(id), NodeKind::Invocation) {
            continue;
        }
        match static_callee(arena, id) {
            Some(("Interlocked", "CompareExchange")) => {
                let first = arena.children_with_role(id, Role::Argument).next()?;
                let NodeKind::UnaryOp {
                    op: UnaryOperator::Ref,
                } = arena.kind(first)
                else {
                    return None;
                };
                let operand = arena.child(first, Role::Operand)?;
                field = backing_name(arena, operand);
            }
            Some(("Delegate", m)) if m == method => saw_combine = true,
            _ => {}
        }
    }
    if saw_combine {
        field
    } else {
        None
    }
}

fn event_accessor_field(
    arena: &Arena,
    accessor_body: NodeId,
    pattern: &Pattern,
    method: &str,
) -> Option<String> {
    if let Some(caps) = match_node(arena, pattern, accessor_body) {
        return caps.get_one("field").and_then(|n| backing_name(arena, n));
    }
    compare_exchange_field(arena, accessor_body, method)
}

impl Recognizer for AutoEvent {
    fn name(&self) -> &'static str {
        "auto-event"
    }

    fn applies_to(&self, kind: &NodeKind) -> bool {
        matches!(kind, NodeKind::EventDeclaration { auto: false, .. })
    }

    fn try_rewrite(&self, cx: &mut PassContext<'_>, node: NodeId) -> PassResult<Rewrite> {
        let arena = &mut *cx.arena;
        let NodeKind::EventDeclaration { name, auto: false } = arena.kind(node) else {
            return Ok(Rewrite::Declined);
        };
        let event_name = name.clone();

        let (Some(adder), Some(remover)) = (
            arena.child(node, Role::Adder),
            arena.child(node, Role::Remover),
        ) else {
            return Ok(Rewrite::Declined);
        };
        let (Some(add_body), Some(remove_body)) = (
            arena.child(adder, Role::Body),
            arena.child(remover, Role::Body),
        ) else {
            return Ok(Rewrite::Declined);
        };
        let Some(field) = event_accessor_field(arena, add_body, &ADD_BODY, "Combine") else {
            return Ok(Rewrite::Declined);
        };
        if event_accessor_field(arena, remove_body, &REMOVE_BODY, "Remove") != Some(field.clone()) {
            return Ok(Rewrite::Declined);
        }
        // The backing field either shares the event's name or is mangled.
        if field != event_name && !is_mangled(&field) {
            return Ok(Rewrite::Declined);
        }

        let Some(ty_decl) = enclosing_type(arena, node) else {
            return Ok(Rewrite::Declined);
        };
        let Some(field_decl) = find_backing_field(arena, ty_decl, &field) else {
            return Ok(Rewrite::Declined);
        };

        debug!(event = %event_name, %field, "recovering auto-event");
        arena.detach(add_body);
        arena.absorb_subtree_provenance(add_body, node);
        arena.detach(remove_body);
        arena.absorb_subtree_provenance(remove_body, node);
        arena.detach(field_decl);
        arena.absorb_subtree_provenance(field_decl, node);
        if let NodeKind::EventDeclaration { auto, .. } = arena.kind_mut(node) {
            *auto = true;
        }
        if field != event_name {
            redirect_backing_refs(arena, ty_decl, &field, &event_name);
        }
        Ok(Rewrite::Applied(node))
    }
}

// ----------------------------------------------------------------------
// Destructors
// ----------------------------------------------------------------------

/// `void Finalize() { try { body } finally { base.Finalize(); } }` becomes
/// a destructor declaration holding just the body.
pub struct Destructor;

static FINALIZE_BODY: LazyLock<Pattern> = LazyLock::new(|| {
    pat::block(vec![pat::try_finally(
        Pattern::capture("body", Pattern::any()),
        pat::block(vec![pat::expr_stmt(pat::invoke(
            pat::member(pat::base(), "Finalize"),
            vec![],
        ))]),
    )])
});

impl Recognizer for Destructor {
    fn name(&self) -> &'static str {
        "destructor"
    }

    fn applies_to(&self, kind: &NodeKind) -> bool {
        matches!(kind, NodeKind::MethodDeclaration { name } if name == "Finalize")
    }

    fn try_rewrite(&self, cx: &mut PassContext<'_>, node: NodeId) -> PassResult<Rewrite> {
        let arena = &mut *cx.arena;
        if !matches!(
            arena.kind(node),
            NodeKind::MethodDeclaration { name } if name == "Finalize"
        ) {
            return Ok(Rewrite::Declined);
        }
        if arena.children_with_role(node, Role::Parameter).next().is_some() {
            return Ok(Rewrite::Declined);
        }
        let Some(body) = arena.child(node, Role::Body) else {
            return Ok(Rewrite::Declined);
        };
        let Some(caps) = match_node(arena, &FINALIZE_BODY, body) else {
            return Ok(Rewrite::Declined);
        };
        let Some(inner) = caps.get_one("body") else {
            return Ok(Rewrite::Declined);
        };
        if !matches!(arena.kind(inner), NodeKind::Block) {
            return Ok(Rewrite::Declined);
        }

        debug!("recovering destructor");
        let dtor = arena.alloc(NodeKind::DestructorDeclaration);
        arena.detach(inner);
        arena.replace(node, dtor);
        arena.absorb_subtree_provenance(node, dtor);
        arena.append_child(dtor, Role::Body, inner);
        Ok(Rewrite::Applied(dtor))
    }
}

// ----------------------------------------------------------------------
// Decimal constants
// ----------------------------------------------------------------------

/// Folds `new decimal(lo, mid, hi, isNegative, scale)` field initializers
/// into a single decimal literal carrying the components and the rendered
/// value.
pub struct DecimalConstant;

fn literal_u32(arena: &Arena, id: NodeId) -> Option<u32> {
    match arena.kind(id) {
        NodeKind::Literal {
            value: Literal::Int(i),
        } => u32::try_from(*i).ok(),
        _ => None,
    }
}

fn literal_sign(arena: &Arena, id: NodeId) -> Option<bool> {
    match arena.kind(id) {
        NodeKind::Literal {
            value: Literal::Bool(b),
        } => Some(*b),
        NodeKind::Literal {
            value: Literal::Int(0),
        } => Some(false),
        NodeKind::Literal {
            value: Literal::Int(1),
        } => Some(true),
        _ => None,
    }
}

fn render_decimal(lo: u32, mid: u32, hi: u32, negative: bool, scale: u8) -> String {
    let magnitude = (u128::from(hi) << 64) | (u128::from(mid) << 32) | u128::from(lo);
    let mut digits = magnitude.to_string();
    let scale = usize::from(scale);
    if scale > 0 {
        if digits.len() <= scale {
            digits = format!("{digits:0>width$}", width = scale + 1);
        }
        digits.insert(digits.len() - scale, '.');
    }
    if negative && magnitude != 0 {
        digits.insert(0, '-');
    }
    digits
}

impl Recognizer for DecimalConstant {
    fn name(&self) -> &'static str {
        "decimal-constant"
    }

    fn applies_to(&self, kind: &NodeKind) -> bool {
        matches!(kind, NodeKind::FieldDeclaration { .. })
    }

    fn try_rewrite(&self, cx: &mut PassContext<'_>, node: NodeId) -> PassResult<Rewrite> {
        let arena = &mut *cx.arena;
        if !matches!(arena.kind(node), NodeKind::FieldDeclaration { .. }) {
            return Ok(Rewrite::Declined);
        }
        let Some(init) = arena.child(node, Role::Initializer) else {
            return Ok(Rewrite::Declined);
        };
        let NodeKind::ObjectCreation { ty } = arena.kind(init) else {
            return Ok(Rewrite::Declined);
        };
        if !matches!(ty.as_str(), "decimal" | "Decimal" | "System.Decimal") {
            return Ok(Rewrite::Declined);
        }
        let args: Vec<NodeId> = arena.children_with_role(init, Role::Argument).collect();
        let [lo, mid, hi, sign, scale] = args[..] else {
            return Ok(Rewrite::Declined);
        };
        let (Some(lo), Some(mid), Some(hi), Some(negative), Some(scale)) = (
            literal_u32(arena, lo),
            literal_u32(arena, mid),
            literal_u32(arena, hi),
            literal_sign(arena, sign),
            literal_u32(arena, scale),
        ) else {
            return Ok(Rewrite::Declined);
        };
        // Decimal scale caps at 28 fractional digits.
        if scale > 28 {
            return Ok(Rewrite::Declined);
        }
        let scale = scale as u8;

        let text = render_decimal(lo, mid, hi, negative, scale);
        debug!(%text, "folding decimal constant");
        let literal = arena.alloc(NodeKind::Literal {
            value: Literal::Decimal {
                lo,
                mid,
                hi,
                negative,
                scale,
                text,
            },
        });
        arena.replace(init, literal);
        arena.absorb_subtree_provenance(init, literal);
        Ok(Rewrite::Applied(node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{CancellationToken, PassContext};
    use crate::env::DefaultEnvironment;
    use resugar_tree::{build, AccessorKind, IlRange};

    fn apply(arena: &mut Arena, rec: &dyn Recognizer, node: NodeId) -> Rewrite {
        let env = DefaultEnvironment;
        let mut cx = PassContext::new(arena, &env, CancellationToken::new());
        rec.try_rewrite(&mut cx, node).unwrap()
    }

    mod auto_property {
        use super::*;

        /// Builds a type holding the backing field and the lowered property.
        fn lowered_property(arena: &mut Arena, field: &str) -> (NodeId, NodeId) {
            let this = build::this_ref(arena);
            let read = build::member(arena, this, field);
            let ret = build::return_stmt(arena, Some(read));
            let get_body = build::block(arena, vec![ret]);
            let getter = build::accessor(arena, AccessorKind::Get, Some(get_body));

            let this = build::this_ref(arena);
            let write = build::member(arena, this, field);
            let value = build::ident(arena, "value");
            let store = build::assign_stmt(arena, write, value);
            let set_body = build::block(arena, vec![store]);
            let setter = build::accessor(arena, AccessorKind::Set, Some(set_body));

            let prop = build::property_decl(arena, "Count", Some(getter), Some(setter));
            let backing = build::field_decl(arena, field, Some("int"), None);
            let ty = build::type_decl(arena, "Widget", vec![backing, prop]);
            (ty, prop)
        }

        #[test]
        fn lowered_accessors_become_auto() {
            let mut arena = Arena::new();
            let (ty, prop) = lowered_property(&mut arena, "<Count>k__BackingField");
            arena.provenance_mut(prop).add(IlRange::new(10, 20));
            let before = arena.collect_provenance(ty);

            assert_eq!(apply(&mut arena, &AutoProperty, prop), Rewrite::Applied(prop));
            assert!(matches!(
                arena.kind(prop),
                NodeKind::PropertyDeclaration { auto: true, .. }
            ));
            let getter = arena.child(prop, Role::Getter).unwrap();
            assert!(arena.child(getter, Role::Body).is_none());
            // Backing field is gone from the type.
            assert_eq!(arena.children(ty).len(), 1);
            assert_eq!(arena.collect_provenance(ty), before);
        }

        #[test]
        fn ordinary_field_getter_declines() {
            let mut arena = Arena::new();
            let (_, prop) = lowered_property(&mut arena, "count");
            assert_eq!(apply(&mut arena, &AutoProperty, prop), Rewrite::Declined);
        }

        #[test]
        fn mismatched_setter_field_declines() {
            let mut arena = Arena::new();
            let this = build::this_ref(&mut arena);
            let read = build::member(&mut arena, this, "<Count>k__BackingField");
            let ret = build::return_stmt(&mut arena, Some(read));
            let get_body = build::block(&mut arena, vec![ret]);
            let getter = build::accessor(&mut arena, AccessorKind::Get, Some(get_body));
            let this = build::this_ref(&mut arena);
            let write = build::member(&mut arena, this, "<Other>k__BackingField");
            let value = build::ident(&mut arena, "value");
            let store = build::assign_stmt(&mut arena, write, value);
            let set_body = build::block(&mut arena, vec![store]);
            let setter = build::accessor(&mut arena, AccessorKind::Set, Some(set_body));
            let prop = build::property_decl(&mut arena, "Count", Some(getter), Some(setter));
            let backing =
                build::field_decl(&mut arena, "<Count>k__BackingField", Some("int"), None);
            build::type_decl(&mut arena, "Widget", vec![backing, prop]);
            assert_eq!(apply(&mut arena, &AutoProperty, prop), Rewrite::Declined);
        }

        #[test]
        fn surviving_references_follow_the_property() {
            let mut arena = Arena::new();
            let (ty, prop) = lowered_property(&mut arena, "<Count>k__BackingField");
            // A constructor-style method still writing the backing field.
            let this = build::this_ref(&mut arena);
            let access = build::member(&mut arena, this, "<Count>k__BackingField");
            let zero = build::lit_int(&mut arena, 0);
            let init = build::assign_stmt(&mut arena, access, zero);
            let body = build::block(&mut arena, vec![init]);
            let ctor = build::method_decl(&mut arena, "Widget", vec![], body);
            arena.append_child(ty, Role::Member, ctor);

            assert_eq!(apply(&mut arena, &AutoProperty, prop), Rewrite::Applied(prop));
            assert!(matches!(
                arena.kind(access),
                NodeKind::MemberAccess { member } if member == "Count"
            ));
        }
    }

    mod auto_event {
        use super::*;

        fn combine_accessor(arena: &mut Arena, kind: AccessorKind, method: &str) -> NodeId {
            let this = build::this_ref(arena);
            let target = build::member(arena, this, "Changed");
            let this = build::this_ref(arena);
            let current = build::member(arena, this, "Changed");
            let value = build::ident(arena, "value");
            let callee = build::static_member(arena, "Delegate", method);
            let call = build::invoke(arena, callee, vec![current, value]);
            let cast = build::cast(arena, "EventHandler", call);
            let store = build::assign_stmt(arena, target, cast);
            let body = build::block(arena, vec![store]);
            build::accessor(arena, kind, Some(body))
        }

        #[test]
        fn combine_accessors_become_auto() {
            let mut arena = Arena::new();
            let adder = combine_accessor(&mut arena, AccessorKind::Add, "Combine");
            let remover = combine_accessor(&mut arena, AccessorKind::Remove, "Remove");
            let event = build::event_decl(&mut arena, "Changed", Some(adder), Some(remover));
            let backing = build::field_decl(&mut arena, "Changed", Some("EventHandler"), None);
            let ty = build::type_decl(&mut arena, "Widget", vec![backing, event]);

            assert_eq!(apply(&mut arena, &AutoEvent, event), Rewrite::Applied(event));
            assert!(matches!(
                arena.kind(event),
                NodeKind::EventDeclaration { auto: true, .. }
            ));
            assert_eq!(arena.children(ty).len(), 1);
        }

        #[test]
        fn compare_exchange_loop_becomes_auto() {
            let mut arena = Arena::new();
            // do { h2 = h; v = Delegate.Combine(h2, value);
            //      h = Interlocked.CompareExchange(ref this.Changed, v, h2);
            // } while (h != h2);
            let build_loop = |arena: &mut Arena, method: &str| {
                let h2 = build::ident(arena, "h2");
                let value = build::ident(arena, "value");
                let callee = build::static_member(arena, "Delegate", method);
                let combine = build::invoke(arena, callee, vec![h2, value]);
                let v = build::var_decl(arena, "v", None, Some(combine));
                let this = build::this_ref(arena);
                let field = build::member(arena, this, "Changed");
                let by_ref = build::unop(arena, UnaryOperator::Ref, field);
                let v_use = build::ident(arena, "v");
                let h2_use = build::ident(arena, "h2");
                let callee = build::static_member(arena, "Interlocked", "CompareExchange");
                let cmpxchg = build::invoke(arena, callee, vec![by_ref, v_use, h2_use]);
                let h = build::ident(arena, "h");
                let store = build::assign_stmt(arena, h, cmpxchg);
                let body = build::block(arena, vec![v, store]);
                let h = build::ident(arena, "h");
                let h2 = build::ident(arena, "h2");
                let cond = build::binop(arena, resugar_tree::BinaryOperator::Ne, h, h2);
                let do_while = arena.alloc(NodeKind::DoWhile);
                arena.append_child(do_while, Role::Body, body);
                arena.append_child(do_while, Role::Condition, cond);
                build::block(arena, vec![do_while])
            };
            let add_body = build_loop(&mut arena, "Combine");
            let adder = build::accessor(&mut arena, AccessorKind::Add, Some(add_body));
            let remove_body = build_loop(&mut arena, "Remove");
            let remover = build::accessor(&mut arena, AccessorKind::Remove, Some(remove_body));
            let event = build::event_decl(&mut arena, "Changed", Some(adder), Some(remover));
            let backing = build::field_decl(&mut arena, "Changed", Some("EventHandler"), None);
            build::type_decl(&mut arena, "Widget", vec![backing, event]);

            assert_eq!(apply(&mut arena, &AutoEvent, event), Rewrite::Applied(event));
        }

        #[test]
        fn mismatched_accessor_fields_decline() {
            let mut arena = Arena::new();
            let adder = combine_accessor(&mut arena, AccessorKind::Add, "Combine");
            // Remover combines instead of removing.
            let remover = combine_accessor(&mut arena, AccessorKind::Remove, "Combine");
            let event = build::event_decl(&mut arena, "Changed", Some(adder), Some(remover));
            let backing = build::field_decl(&mut arena, "Changed", Some("EventHandler"), None);
            build::type_decl(&mut arena, "Widget", vec![backing, event]);
            assert_eq!(apply(&mut arena, &AutoEvent, event), Rewrite::Declined);
        }
    }

    mod destructor {
        use super::*;

        #[test]
        fn finalize_with_base_call_becomes_destructor() {
            let mut arena = Arena::new();
            let callee = build::ident(&mut arena, "Close");
            let call = build::invoke(&mut arena, callee, vec![]);
            let work = build::expr_stmt(&mut arena, call);
            let inner = build::block(&mut arena, vec![work]);
            let base = build::base_ref(&mut arena);
            let finalize = build::member(&mut arena, base, "Finalize");
            let base_call = build::invoke(&mut arena, finalize, vec![]);
            let base_stmt = build::expr_stmt(&mut arena, base_call);
            let fin = build::block(&mut arena, vec![base_stmt]);
            let try_stmt = build::try_finally(&mut arena, inner, fin);
            let body = build::block(&mut arena, vec![try_stmt]);
            let method = build::method_decl(&mut arena, "Finalize", vec![], body);
            let ty = build::type_decl(&mut arena, "Widget", vec![method]);
            arena.provenance_mut(try_stmt).add(IlRange::new(0, 12));
            let before = arena.collect_provenance(ty);

            let out = apply(&mut arena, &Destructor, method);
            let Rewrite::Applied(dtor) = out else {
                panic!("expected a rewrite, got {out:?}");
            };
            assert!(matches!(arena.kind(dtor), NodeKind::DestructorDeclaration));
            assert_eq!(arena.child(dtor, Role::Body), Some(inner));
            assert_eq!(arena.collect_provenance(ty), before);
        }

        #[test]
        fn finalize_without_base_call_declines() {
            let mut arena = Arena::new();
            let callee = build::ident(&mut arena, "Close");
            let call = build::invoke(&mut arena, callee, vec![]);
            let work = build::expr_stmt(&mut arena, call);
            let body = build::block(&mut arena, vec![work]);
            let method = build::method_decl(&mut arena, "Finalize", vec![], body);
            build::type_decl(&mut arena, "Widget", vec![method]);
            assert_eq!(apply(&mut arena, &Destructor, method), Rewrite::Declined);
        }
    }

    mod decimal_constant {
        use super::*;

        fn decimal_field(arena: &mut Arena, components: [i64; 3], negative: bool, scale: i64) -> NodeId {
            let lo = build::lit_int(arena, components[0]);
            let mid = build::lit_int(arena, components[1]);
            let hi = build::lit_int(arena, components[2]);
            let sign = build::lit_bool(arena, negative);
            let sc = build::lit_int(arena, scale);
            let ctor = build::object_creation(arena, "decimal", vec![lo, mid, hi, sign, sc]);
            build::field_decl(arena, "Rate", Some("decimal"), Some(ctor))
        }

        #[test]
        fn constructor_folds_to_literal() {
            let mut arena = Arena::new();
            let field = decimal_field(&mut arena, [15, 0, 0], false, 1);
            assert_eq!(
                apply(&mut arena, &DecimalConstant, field),
                Rewrite::Applied(field)
            );
            let init = arena.child(field, Role::Initializer).unwrap();
            let NodeKind::Literal {
                value: Literal::Decimal { text, scale, .. },
            } = arena.kind(init)
            else {
                panic!("initializer did not fold");
            };
            assert_eq!(text, "1.5");
            assert_eq!(*scale, 1);
        }

        #[test]
        fn negative_and_padded_rendering() {
            assert_eq!(render_decimal(5, 0, 0, true, 3), "-0.005");
            assert_eq!(render_decimal(42, 0, 0, false, 0), "42");
            assert_eq!(render_decimal(0, 0, 0, true, 0), "0");
        }

        #[test]
        fn out_of_range_scale_declines() {
            let mut arena = Arena::new();
            let field = decimal_field(&mut arena, [1, 0, 0], false, 40);
            assert_eq!(
                apply(&mut arena, &DecimalConstant, field),
                Rewrite::Declined
            );
        }
    }
}
