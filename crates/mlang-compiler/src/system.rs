//! System lowering.
//!
//! A system expansion becomes an `async fn` owning one `TaskGroup` scope:
//!
//! 1. internal nodes and one anonymous node per distinct component port
//!    named by a connection are allocated as `Port`s;
//! 2. every task is built, binding each automaton to a fresh party on each
//!    of its nodes;
//! 3. only then is every task spawned, so no party starts a rendezvous before
//!    all parties sharing the node are registered;
//! 4. the scope joins, which for a reactive network means it runs until torn
//!    down or a task fails.
//!
//! There is one task per component instance and one per connection.

use mlang_core::ast::{Category, ComponentDecl, Connection, EntityRef, PortRef, SystemBody};
use mlang_core::node::NodeKind;
use mlang_core::{At, LoweringError, NameError, TypeError};
use rustc_hash::FxHashMap;

use crate::connection::ConnectionTable;
use crate::context::TypeContext;
use crate::emit::{self, CodeWriter};
use crate::pipeline::LoweredExpansion;
use crate::template::{ExpansionDatum, ExpansionRequest, TemplateManager};
use crate::term::resolve_request;

/// One task of the system, ready to be emitted.
struct Task {
    category: Category,
    table: ConnectionTable,
    label: String,
}

struct SystemLowerer<'a> {
    ctx: TypeContext,
    manager: &'a mut TemplateManager,
    requests: Vec<ExpansionRequest>,
    instances: Vec<Task>,
    index: FxHashMap<String, usize>,
    anonymous: FxHashMap<(String, String), String>,
}

#[cfg_attr(feature = "profiling", profiling::function)]
pub fn lower_system(
    body: &SystemBody,
    expansion: &ExpansionDatum,
    manager: &mut TemplateManager,
) -> Result<LoweredExpansion, LoweringError> {
    let mut lowerer = SystemLowerer {
        ctx: expansion.context.clone(),
        manager,
        requests: Vec::new(),
        instances: Vec::new(),
        index: FxHashMap::default(),
        anonymous: FxHashMap::default(),
    };

    let mut out = CodeWriter::new();
    out.open(format!(
        "pub async fn {}{} -> Result<(), RuntimeError> {{",
        expansion.actual_name,
        expansion.signature.render_definition()
    ));

    for name in &body.internals {
        lowerer
            .ctx
            .set_internal_node(name)
            .at(NodeKind::SystemInter)?;
        out.line(format!("let {} = Port::new();", emit::local(name)));
    }
    for component in &body.components {
        lowerer.component(component)?;
    }
    let mut connections = Vec::with_capacity(body.connections.len());
    for (k, connection) in body.connections.iter().enumerate() {
        connections.push(lowerer.connection(k, connection, &mut out)?);
    }

    let tasks: Vec<Task> = lowerer.instances.drain(..).chain(connections).collect();
    out.line("let mut tasks = TaskGroup::new();");
    for (k, task) in tasks.iter().enumerate() {
        let party = format!("party_{k}");
        if task.category == Category::Automaton {
            out.line(format!("let {party} = PartyId::fresh();"));
        }
        let call = task
            .table
            .translate(&task.label, &party)
            .at(NodeKind::ComponentDecl)?;
        match task.category {
            Category::System => out.line(format!("let task_{k} = Box::pin({call});")),
            _ => out.line(format!("let task_{k} = {call};")),
        }
    }
    for k in 0..tasks.len() {
        out.line(format!("tasks.spawn(task_{k});"));
    }
    out.line("tasks.join().await");
    out.close("}");

    Ok(LoweredExpansion {
        code: out.finish(),
        requests: lowerer.requests,
    })
}

impl SystemLowerer<'_> {
    /// Resolve `entity` to its expansion and start an empty wiring table.
    fn table(&mut self, entity: &EntityRef, node: NodeKind) -> Result<ConnectionTable, LoweringError> {
        let req = resolve_request(&self.ctx, entity).at(node)?;
        let (expansion, created) = self.manager.query_or_create(&req).at(node)?;
        if created {
            self.requests.push(req);
        }
        expansion
            .signature
            .new_connection_table(&expansion.actual_name)
            .at(node)
    }

    fn component(&mut self, decl: &ComponentDecl) -> Result<(), LoweringError> {
        let node = NodeKind::ComponentDecl;
        let table = self.table(&decl.entity, node)?;
        for instance in &decl.instances {
            let existing = match self.ctx.namespace_of(instance) {
                Some(ns) => Some(ns.describe()),
                None if self.index.contains_key(instance) => Some("a component"),
                None => None,
            };
            if let Some(existing) = existing {
                return Err(NameError::Redeclared {
                    name: instance.clone(),
                    existing,
                })
                .at(node);
            }
            self.index.insert(instance.clone(), self.instances.len());
            self.instances.push(Task {
                category: table.category(),
                table: table.clone(),
                label: instance.clone(),
            });
        }
        Ok(())
    }

    fn connection(
        &mut self,
        k: usize,
        connection: &Connection,
        out: &mut CodeWriter,
    ) -> Result<Task, LoweringError> {
        let node = NodeKind::EntityConnection;
        let mut table = self.table(&connection.entity, node)?;
        let arity = table.ports().count();
        if arity != connection.endpoints.len() {
            return Err(TypeError::ArityMismatch {
                what: format!("connection '{}'", connection.entity.name),
                expected: arity,
                got: connection.endpoints.len(),
            })
            .at(node);
        }

        for (i, endpoint) in connection.endpoints.iter().enumerate() {
            let wired = self.endpoint(endpoint, out)?;
            table.set_node_at(i, wired);
        }
        Ok(Task {
            category: table.category(),
            table,
            label: format!("{}#{k}", connection.entity.name),
        })
    }

    /// The emitted node an endpoint refers to, allocating anonymous nodes for
    /// component ports on first use.
    fn endpoint(&mut self, endpoint: &PortRef, out: &mut CodeWriter) -> Result<String, LoweringError> {
        match endpoint {
            PortRef::System(name) => {
                if self.ctx.is_port(name) || self.ctx.is_internal_node(name) {
                    Ok(emit::local(name))
                } else {
                    Err(NameError::UnknownPort(name.clone())).at(NodeKind::SysPortName)
                }
            }
            PortRef::Component { instance, port } => {
                let key = (instance.clone(), port.clone());
                if let Some(existing) = self.anonymous.get(&key) {
                    return Ok(existing.clone());
                }
                let &slot = self
                    .index
                    .get(instance)
                    .ok_or_else(|| NameError::UnknownComponent(instance.clone()))
                    .at(NodeKind::CompPortName)?;
                let name = format!("n_{}", self.anonymous.len());
                self.instances[slot]
                    .table
                    .set_node(port, name.clone())
                    .at(NodeKind::CompPortName)?;
                out.line(format!("let {name} = Port::new();"));
                self.anonymous.insert(key, name.clone());
                Ok(name)
            }
        }
    }
}
