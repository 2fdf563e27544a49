//! The stepping machine: a steppable program executor. It owns the object
//! store, the frame-object pointer, and the residual program AST, and
//! progresses execution exactly one reduction at a time so that a host can
//! pause, inspect the store, and resume between any two steps.

use crate::{
    ast::{BoolExpr, Expr, Program, Rhs, Stmt},
    consts::{CTOR_METHOD, MAX_STEP_COUNT, PROTO_VAR, SELF_VAR},
    error::{RuntimeError, WithStep},
    printer,
    store::{ClassObject, Method, Reference, StateKey, Store, Value},
};
use log::{debug, trace};
use std::collections::HashMap;

/// A steppable program executor. Maintains the current configuration of the
/// program - the residual AST, the object store, and the frame-object pointer
/// - and execution can be progressed one reduction at a time.
///
/// Created from a parsed [Program]. Construction already performs the program
/// initialisation: the class registry and the initial stack frame exist
/// before the first step, and the first step reduces the program's initial
/// statement.
#[derive(Clone, Debug)]
pub struct Machine {
    store: Store,
    /// Reference of the topmost stack frame. The stack is the chain of
    /// frames linked by their PREV slots, terminated by the initial frame's
    /// self-loop.
    fop: Reference,
    /// The residual program. `None` once the program has been reduced away
    /// entirely; a root [Stmt::ReturnValue] also means termination.
    root: Option<Stmt>,
    /// The number of steps attempted so far, including steps that failed.
    step_count: usize,
    /// The inspector's label table: name -> labelled reference. Entries may
    /// dangle after a sweep; that is deliberate.
    labels: HashMap<String, Reference>,
}

impl Machine {
    /// Create a machine for the given program, ready to be executed.
    ///
    /// This performs the [prog] initialisation: the initial frame is created
    /// with its PREV slot pointing at itself (the stack-bottom sentinel), a
    /// prototype and a class object are built for every class declaration,
    /// and the class registry holding them is stored in the initial frame's
    /// CLASS slot.
    pub fn new(program: Program) -> Self {
        let mut store = Store::new();

        // Initial frame. Its PREV self-loop marks the bottom of the stack.
        let fop = store.put(ClassObject::new());
        store
            .setv(vec![(StateKey::Prev, Some(fop))], fop)
            .expect("initial frame vanished");

        // Build prototypes and class objects, and register them. A class
        // declared twice overwrites its earlier registration.
        let mut registry = ClassObject::new();
        let class_count = program.classes.len();
        for class in program.classes {
            let mut proto = ClassObject::new();
            for var in &class.vars {
                proto.set(StateKey::var(var), None);
            }
            for method in class.methods {
                proto.add_method(
                    method.name,
                    Method {
                        params: method.params,
                        body: method.body,
                    },
                );
            }
            let proto_ref = store.put(proto);

            let mut class_obj = ClassObject::new();
            class_obj.set(StateKey::var(PROTO_VAR), Some(proto_ref));
            class_obj.add_method(
                CTOR_METHOD,
                Method {
                    params: class.ctor.params,
                    body: class.ctor.body,
                },
            );
            let class_ref = store.put(class_obj);
            registry.set(StateKey::var(&class.name), Some(class_ref));
        }
        let registry_ref = store.put(registry);
        store
            .setv(vec![(StateKey::Class, Some(registry_ref))], fop)
            .expect("initial frame vanished");

        debug!("registered {} classes", class_count);
        Self {
            store,
            fop,
            root: Some(program.initial),
            step_count: 0,
            labels: HashMap::new(),
        }
    }

    /// Perform the next reduction step.
    ///
    /// # Returns
    /// - `Ok(true)` if a step was performed
    /// - `Ok(false)` if nothing happened because the program has already
    ///   terminated
    /// - `Err(error)` if the step failed. The configuration is left in its
    ///   pre-failure state, so the store can still be inspected; calling
    ///   again re-attempts the same reduction.
    pub fn execute_next(&mut self) -> Result<bool, WithStep> {
        if self.terminated() {
            return Ok(false);
        }

        // If we've reached this point we are going to attempt the step.
        // Count it now, so a failing step still counts.
        self.step_count += 1;
        if self.step_count > MAX_STEP_COUNT {
            return Err(WithStep::new(
                RuntimeError::TooManySteps,
                self.step_count,
            ));
        }

        let root = self.root.take().expect("unterminated machine has a root");
        // Reducing consumes the tree, so keep a copy to restore if the step
        // fails partway through.
        let saved = root.clone();
        match self.step_stmt(root) {
            Ok(residual) => {
                trace!("step {} complete", self.step_count);
                self.root = residual;
                Ok(true)
            }
            Err(error) => {
                self.root = Some(saved);
                Err(WithStep::new(error, self.step_count))
            }
        }
    }

    /// Perform up to `n` reduction steps, stopping early on termination.
    /// Returns the number of steps actually performed.
    pub fn execute_steps(&mut self, n: usize) -> Result<usize, WithStep> {
        let mut performed = 0;
        for _ in 0..n {
            if !self.execute_next()? {
                break;
            }
            performed += 1;
        }
        Ok(performed)
    }

    /// Execute until the program terminates (or a step fails). Returns the
    /// number of steps performed.
    pub fn execute_all(&mut self) -> Result<usize, WithStep> {
        let mut performed = 0;
        while self.execute_next()? {
            performed += 1;
        }
        Ok(performed)
    }

    /// Has the program finished executing? The program is complete once the
    /// root has been reduced to nothing or to a bare return value.
    pub fn terminated(&self) -> bool {
        matches!(self.root, None | Some(Stmt::ReturnValue(_)))
    }

    /// The value the program reduced to, if it terminated with one.
    pub fn result(&self) -> Option<Value> {
        match &self.root {
            Some(Stmt::ReturnValue(value)) => Some(*value),
            _ => None,
        }
    }

    /// The number of steps attempted so far, including failed steps.
    pub fn step_count(&self) -> usize {
        self.step_count
    }

    /// The reference of the current topmost stack frame.
    pub fn frame_pointer(&self) -> Reference {
        self.fop
    }

    /// Read access to the object store.
    pub fn store(&self) -> &Store {
        &self.store
    }

    pub(crate) fn label_table(&self) -> &HashMap<String, Reference> {
        &self.labels
    }

    pub(crate) fn label_table_mut(
        &mut self,
    ) -> &mut HashMap<String, Reference> {
        &mut self.labels
    }

    /// Pretty-print the current residual program. Reflects every rewrite
    /// applied so far; empty once the program has been reduced away.
    pub fn program_text(&self) -> String {
        match &self.root {
            Some(stmt) => printer::stmt_to_string(stmt),
            None => String::new(),
        }
    }

    /// Delete every object unreachable from the current frame. Never invoked
    /// by the machine itself; hosts may call it between steps. Returns the
    /// number of objects removed.
    pub fn sweep(&mut self) -> usize {
        let removed = self.store.sweep(self.fop);
        debug!("sweep removed {} objects", removed);
        removed
    }

    // ===== Auxiliary routines =====

    /// Read variable `x` through the given frame: the frame's slot for `x`
    /// names the container, and the container's slot for `x` holds the value.
    fn deref(&self, x: &str, frame: Reference) -> Result<Value, RuntimeError> {
        let frame_obj = self.store.get(frame)?;
        let container_ref = frame_obj
            .get_var(x)
            .ok_or_else(|| RuntimeError::UndefinedName(x.to_string()))?
            .ok_or_else(|| RuntimeError::UndefinedName(x.to_string()))?;
        let container = self.store.get(container_ref)?;
        container
            .get_var(x)
            .ok_or_else(|| RuntimeError::UndefinedName(x.to_string()))
    }

    /// Bind each name to its value in the current frame, by allocating a
    /// one-slot container per binding and pointing the frame's slot at it.
    /// This two-level indirection is the encoding of scopes as objects.
    fn declare(
        &mut self,
        bindings: impl IntoIterator<Item = (String, Value)>,
    ) -> Result<(), RuntimeError> {
        for (name, value) in bindings {
            let mut container = ClassObject::new();
            container.set(StateKey::var(&name), value);
            let container_ref = self.store.put(container);
            self.store.setv(
                vec![(StateKey::var(&name), Some(container_ref))],
                self.fop,
            )?;
        }
        Ok(())
    }

    /// Build a frame for executing inside the object at `reference`: every
    /// variable key of the object resolves through the object itself, so the
    /// object's own fields are in scope. PREV is set later by [Self::push];
    /// CLASS is inherited from the current frame.
    fn frame_from(
        &self,
        reference: Reference,
    ) -> Result<ClassObject, RuntimeError> {
        let obj = self.store.get(reference)?;
        let mut frame = ClassObject::new();
        for var in obj.var_names() {
            frame.set(StateKey::var(var), Some(reference));
        }
        frame.set(StateKey::Prev, None);
        let class = self
            .store
            .get(self.fop)?
            .get(&StateKey::Class)
            .unwrap_or(None);
        frame.set(StateKey::Class, class);
        Ok(frame)
    }

    /// Store the given frame, link it to the current stack, and make it the
    /// top of the stack.
    fn push(&mut self, frame: ClassObject) -> Reference {
        let previous = self.fop;
        let reference = self.store.put(frame);
        self.store
            .setv(vec![(StateKey::Prev, Some(previous))], reference)
            .expect("freshly stored frame vanished");
        self.fop = reference;
        reference
    }

    /// Drop the topmost frame from the stack.
    fn pop(&mut self) -> Result<(), RuntimeError> {
        let previous = self
            .store
            .get(self.fop)?
            .get(&StateKey::Prev)
            .unwrap_or(None)
            .ok_or(RuntimeError::MissingReference(None))?;
        self.fop = previous;
        Ok(())
    }

    /// Push a copy of the current frame. Used by rules that introduce a
    /// scope whose bindings start out identical to the enclosing one.
    fn push_frame_copy(&mut self) -> Result<(), RuntimeError> {
        let copy = self.store.get(self.fop)?.clone();
        self.push(copy);
        Ok(())
    }

    /// Resolve a class name through the current frame's CLASS slot and the
    /// class registry behind it.
    fn lookup_class(&self, name: &str) -> Result<Reference, RuntimeError> {
        let registry_ref = self
            .store
            .get(self.fop)?
            .get(&StateKey::Class)
            .unwrap_or(None)
            .ok_or(RuntimeError::MissingReference(None))?;
        let registry = self.store.get(registry_ref)?;
        registry
            .get_var(name)
            .unwrap_or(None)
            .ok_or_else(|| RuntimeError::UndefinedClass(name.to_string()))
    }

    /// Dereference each argument in the current frame and pair it with the
    /// corresponding parameter name. Fails on an arity mismatch.
    fn bind_args(
        &self,
        callee: &str,
        params: &[String],
        args: &[String],
    ) -> Result<Vec<(String, Value)>, RuntimeError> {
        if args.len() != params.len() {
            return Err(RuntimeError::ArityMismatch {
                callee: callee.to_string(),
                expected: params.len(),
                actual: args.len(),
            });
        }
        params
            .iter()
            .zip(args)
            .map(|(param, arg)| {
                Ok((param.clone(), self.deref(arg, self.fop)?))
            })
            .collect()
    }

    // ===== Transition rules =====

    /// Reduce a statement by one step. Returns the replacement for the
    /// visited node; `None` means the statement reduced away entirely.
    fn step_stmt(
        &mut self,
        stmt: Stmt,
    ) -> Result<Option<Stmt>, RuntimeError> {
        match stmt {
            Stmt::Expr(expr) => {
                let body = self.step_expr(expr)?;
                Ok(Some(Stmt::MethodScoped(body)))
            }
            Stmt::Assign(target, rhs) => self.step_assign(target, rhs),
            Stmt::Skip => Ok(None),
            Stmt::Return(var) => {
                let value = self.deref(&var, self.fop)?;
                Ok(Some(Stmt::ReturnValue(value)))
            }
            Stmt::Block { vars, body } => {
                self.push_frame_copy()?;
                self.declare(vars.into_iter().map(|var| (var, None)))?;
                Ok(Some(Stmt::BlockScoped(Box::new(Stmt::Sequence(body)))))
            }
            Stmt::If {
                cond,
                then_stmt,
                else_stmt,
            } => {
                if self.eval_bool(&cond)? {
                    Ok(Some(*then_stmt))
                } else {
                    Ok(Some(*else_stmt))
                }
            }
            Stmt::While { cond, body } => {
                // Unroll one iteration. The While node itself moves into the
                // unrolled sequence unchanged, so the loop target survives
                // without growing the tree on each pass.
                let unrolled = Stmt::Sequence(vec![
                    (*body).clone(),
                    Stmt::While {
                        cond: cond.clone(),
                        body,
                    },
                ]);
                Ok(Some(Stmt::If {
                    cond,
                    then_stmt: Box::new(unrolled),
                    else_stmt: Box::new(Stmt::Skip),
                }))
            }
            Stmt::Sequence(stmts) => self.step_sequence(stmts),
            Stmt::BlockScoped(body) => match self.step_stmt(*body)? {
                None => {
                    self.pop()?;
                    Ok(None)
                }
                Some(done @ Stmt::ReturnValue(_)) => {
                    // A return escapes the block
                    self.pop()?;
                    Ok(Some(done))
                }
                Some(residual) => {
                    Ok(Some(Stmt::BlockScoped(Box::new(residual))))
                }
            },
            Stmt::MethodScoped(body) => match self.step_stmt(*body)? {
                None => {
                    // Void-returning body
                    self.pop()?;
                    Ok(None)
                }
                Some(done @ Stmt::ReturnValue(_)) => {
                    self.pop()?;
                    Ok(Some(done))
                }
                Some(residual) => {
                    Ok(Some(Stmt::MethodScoped(Box::new(residual))))
                }
            },
            // Only ever the root, and the machine stops stepping then
            done @ Stmt::ReturnValue(_) => Ok(Some(done)),
        }
    }

    /// Reduce an expression to the body of its method-scoped residual. All
    /// three expression forms push a frame here; the caller wraps the body
    /// in the scoped node that will pop it.
    fn step_expr(&mut self, expr: Expr) -> Result<Box<Stmt>, RuntimeError> {
        match expr {
            Expr::Var(var) => {
                self.push_frame_copy()?;
                Ok(Box::new(Stmt::Return(var)))
            }
            Expr::New { class, args } => {
                let class_ref = self.lookup_class(&class)?;
                let proto_ref = self
                    .store
                    .get(class_ref)?
                    .get_var(PROTO_VAR)
                    .unwrap_or(None)
                    .ok_or(RuntimeError::MissingReference(None))?;
                let proto = self.store.get(proto_ref)?.clone();
                let new_ref = self.store.put(proto);

                let ctor = self
                    .store
                    .get(class_ref)?
                    .method(CTOR_METHOD)
                    .ok_or_else(|| RuntimeError::NoSuchMethod {
                        target: class_ref.to_string(),
                        method: CTOR_METHOD.to_string(),
                    })?
                    .clone();
                let mut bindings =
                    self.bind_args(&class, &ctor.params, &args)?;
                bindings.push((SELF_VAR.to_string(), Some(new_ref)));

                let frame = self.frame_from(new_ref)?;
                self.push(frame);
                self.declare(bindings)?;

                Ok(Box::new(Stmt::Sequence(vec![
                    ctor.body,
                    Stmt::Return(SELF_VAR.to_string()),
                ])))
            }
            Expr::Call {
                target,
                method,
                args,
            } => {
                let target_ref = self
                    .deref(&target, self.fop)?
                    .ok_or(RuntimeError::MissingReference(None))?;
                let resolved = self
                    .store
                    .get(target_ref)?
                    .method(&method)
                    .ok_or_else(|| RuntimeError::NoSuchMethod {
                        target: target_ref.to_string(),
                        method: method.clone(),
                    })?
                    .clone();
                let mut bindings =
                    self.bind_args(&method, &resolved.params, &args)?;
                bindings.push((SELF_VAR.to_string(), Some(target_ref)));

                let frame = self.frame_from(target_ref)?;
                self.push(frame);
                self.declare(bindings)?;

                Ok(Box::new(resolved.body))
            }
        }
    }

    /// Reduce an assignment. Expression right-hand sides reduce into scoped
    /// bodies; once a scoped body has produced its return value, the
    /// assignment pops the frame the expression pushed and binds the value
    /// in the frame it popped to.
    fn step_assign(
        &mut self,
        target: String,
        rhs: Rhs,
    ) -> Result<Option<Stmt>, RuntimeError> {
        match rhs {
            Rhs::Expr(expr) => {
                let body = self.step_expr(expr)?;
                Ok(Some(Stmt::Assign(target, Rhs::MethodScoped(body))))
            }
            Rhs::MethodScoped(body) => match self.step_stmt(*body)? {
                Some(Stmt::ReturnValue(value)) => {
                    self.bind_assign(&target, value)?;
                    Ok(None)
                }
                // A body that finished without a return binds nil
                None => {
                    self.bind_assign(&target, None)?;
                    Ok(None)
                }
                Some(residual) => Ok(Some(Stmt::Assign(
                    target,
                    Rhs::MethodScoped(Box::new(residual)),
                ))),
            },
        }
    }

    /// Pop the expression's frame, then write the value into the target's
    /// container as found in the frame popped to.
    fn bind_assign(
        &mut self,
        target: &str,
        value: Value,
    ) -> Result<(), RuntimeError> {
        self.pop()?;
        let container_ref = self
            .store
            .get(self.fop)?
            .get_var(target)
            .ok_or_else(|| RuntimeError::UndefinedName(target.to_string()))?
            .ok_or_else(|| RuntimeError::UndefinedName(target.to_string()))?;
        self.store
            .setv(vec![(StateKey::var(target), value)], container_ref)
    }

    /// Reduce the head of a sequence, then fold the sequence: drop a head
    /// that reduced away, let a return value discard the rest, and unwrap a
    /// one-statement sequence.
    fn step_sequence(
        &mut self,
        mut stmts: Vec<Stmt>,
    ) -> Result<Option<Stmt>, RuntimeError> {
        if stmts.is_empty() {
            return Ok(None);
        }
        let head = stmts.remove(0);
        match self.step_stmt(head)? {
            None => {}
            Some(done @ Stmt::ReturnValue(_)) => {
                return Ok(Some(done));
            }
            Some(residual) => stmts.insert(0, residual),
        }

        match stmts.len() {
            0 => Ok(None),
            1 => Ok(Some(stmts.pop().unwrap())),
            _ => Ok(Some(Stmt::Sequence(stmts))),
        }
    }

    /// Evaluate a boolean by dereferencing both variables in the current
    /// frame and comparing the references by identity.
    fn eval_bool(&self, cond: &BoolExpr) -> Result<bool, RuntimeError> {
        match cond {
            BoolExpr::Eq(var1, var2) => {
                Ok(self.deref(var1, self.fop)?
                    == self.deref(var2, self.fop)?)
            }
            BoolExpr::Neq(var1, var2) => {
                Ok(self.deref(var1, self.fop)?
                    != self.deref(var2, self.fop)?)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;

    fn machine(source: &str) -> Machine {
        Machine::new(parse::parse(source).unwrap())
    }

    /// Walk the PREV chain from the current frame down to the stack-bottom
    /// self-loop, returning the frames visited (topmost first).
    fn stack_frames(machine: &Machine) -> Vec<Reference> {
        let mut frames = Vec::new();
        let mut current = machine.frame_pointer();
        loop {
            assert!(
                !frames.contains(&current),
                "PREV chain revisited {} before the stack bottom",
                current
            );
            frames.push(current);
            let previous = machine
                .store()
                .get(current)
                .expect("frame missing from store")
                .get(&StateKey::Prev)
                .expect("frame has no PREV slot")
                .expect("PREV slot is nil");
            if previous == current {
                return frames;
            }
            current = previous;
        }
    }

    #[test]
    fn test_initialisation_builds_registry() {
        let m = machine(
            "class C is begin constructor() is skip; end;
             class D is begin constructor() is skip; end;
             new C()",
        );
        // initial frame + 2 prototypes + 2 class objects + registry
        assert_eq!(m.store().len(), 6);
        assert_eq!(m.step_count(), 0);
        assert!(!m.terminated());

        let class_ref = m.lookup_class("C").unwrap();
        let class_obj = m.store().get(class_ref).unwrap();
        assert!(class_obj.method(CTOR_METHOD).is_some());
        assert!(class_obj.get_var(PROTO_VAR).is_some());
        assert!(matches!(
            m.lookup_class("E"),
            Err(RuntimeError::UndefinedClass(_))
        ));
    }

    #[test]
    fn test_empty_constructor_runs_to_completion() {
        let mut m =
            machine("class C is begin constructor() is skip; end; new C()");
        // [new], then the sequence folds skip away, then return self
        assert_eq!(m.execute_all().unwrap(), 3);
        assert!(m.terminated());
        let result = m.result().unwrap().unwrap();
        // The result instance has no member variables
        assert_eq!(
            m.store().get(result).unwrap().var_names().count(),
            0
        );
        // The stack is back down to the initial frame
        assert_eq!(stack_frames(&m).len(), 1);
    }

    #[test]
    fn test_steps_after_termination_are_noops() {
        let mut m =
            machine("class C is begin constructor() is skip; end; new C()");
        m.execute_all().unwrap();
        let steps = m.step_count();
        let store_size = m.store().len();
        assert!(!m.execute_next().unwrap());
        assert_eq!(m.step_count(), steps);
        assert_eq!(m.store().len(), store_size);
    }

    #[test]
    fn test_program_text_reflects_rewrites() {
        let mut m =
            machine("class C is begin constructor() is skip; end; new C()");
        assert_eq!(m.program_text(), "new C()");
        m.execute_next().unwrap();
        assert_eq!(m.program_text(), "[\n  skip;\n  return self\n]");
        m.execute_next().unwrap();
        assert_eq!(m.program_text(), "[ return self ]");
        m.execute_next().unwrap();
        assert_eq!(m.program_text(), "");
    }

    #[test]
    fn test_stack_discipline_during_nested_calls() {
        let mut m = machine(
            "class C is begin
               var x;
               constructor() is x := new D();
             end;
             class D is begin constructor() is skip; end;
             new C()",
        );
        let registry = m
            .store()
            .get(m.frame_pointer())
            .unwrap()
            .get(&StateKey::Class)
            .unwrap();

        let mut max_depth = 1;
        while !m.terminated() {
            m.execute_next().unwrap();
            let frames = stack_frames(&m);
            max_depth = max_depth.max(frames.len());
            // Every frame on the stack shares the initial frame's CLASS
            for frame in frames {
                assert_eq!(
                    m.store()
                        .get(frame)
                        .unwrap()
                        .get(&StateKey::Class)
                        .unwrap(),
                    registry
                );
            }
        }
        // Constructor frame plus the nested constructor's frame
        assert!(max_depth >= 3);
        assert_eq!(stack_frames(&m).len(), 1);
    }

    #[test]
    fn test_method_bodies_survive_execution_unchanged() {
        let mut m = machine(
            "class C is begin
               var x;
               constructor(v) is x := v;
               method get() is return x;
             end;
             begin var a; var b; a := new C(b); b := a.get() end",
        );
        m.execute_all().unwrap();

        let class_ref = m.lookup_class("C").unwrap();
        let proto_ref = m
            .store()
            .get(class_ref)
            .unwrap()
            .get_var(PROTO_VAR)
            .unwrap()
            .unwrap();
        let get = m.store().get(proto_ref).unwrap().method("get").unwrap();
        assert_eq!(get.body, Stmt::Return("x".to_string()));
        let ctor =
            m.store().get(class_ref).unwrap().method(CTOR_METHOD).unwrap();
        assert_eq!(
            ctor.body,
            Stmt::Assign("x".to_string(), Rhs::Expr(Expr::Var("v".to_string())))
        );
    }

    #[test]
    fn test_while_does_not_grow_the_tree() {
        let mut m = machine(
            "class N is begin
               var next;
               constructor() is skip;
               method set(n) is next := n;
               method get() is return next;
             end;
             begin
               var a; var b; var cur; var stop;
               a := new N();
               b := new N();
               a.set(b);
               b.set(b);
               cur := a;
               stop := b;
               while cur != stop do cur := cur.get()
             end",
        );
        let mut largest = 0;
        while !m.terminated() {
            m.execute_next().unwrap();
            largest = largest.max(m.program_text().len());
            assert!(m.step_count() < 200, "loop failed to terminate");
        }
        // Sequence flattening keeps the residual bounded; it never exceeds
        // a couple of unrolled iterations worth of text
        assert!(largest < 400);
    }
}
