//! All the types that can appear in a Class abstract syntax tree. There is no
//! functionality implemented here, just basic types. The machine rewrites
//! these nodes in place of the program as it executes, so a tree holds both
//! source constructs and residuals ([Stmt::ReturnValue] and the scoped
//! statements); `clone()` is the deep copy used when bodies are duplicated.

use crate::store::Value;

/// A class or method name.
pub type Name = String;

/// A variable name.
pub type Var = String;

/// A boolean comparison between two variables. Equality is reference
/// identity, not structural comparison.
#[derive(Clone, Debug, PartialEq)]
pub enum BoolExpr {
    /// The two variables hold the same reference
    Eq(Var, Var),
    /// The two variables hold different references
    Neq(Var, Var),
}

/// An expression. Expressions always reduce to a method-scoped statement
/// that eventually yields a [Stmt::ReturnValue].
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// Read a variable, e.g. `x`
    Var(Var),
    /// Instantiate a class, e.g. `new C(a, b)`
    New { class: Name, args: Vec<Var> },
    /// Call a method on the object a variable refers to, e.g. `o.m(a)`
    Call {
        target: Var,
        method: Name,
        args: Vec<Var>,
    },
}

/// The right-hand side of an assignment: either an expression, or the
/// method-scoped sugar `x := [ ... ]` binding the eventual return value. The
/// scoped form is a separate type from [Stmt::MethodScoped] because the
/// assignment itself pops the frame and binds the value, where a free
/// method-scoped statement would pop and discard it.
#[derive(Clone, Debug, PartialEq)]
pub enum Rhs {
    Expr(Expr),
    MethodScoped(Box<Stmt>),
}

/// A statement, including the residual forms produced by reduction.
#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    /// `x := rhs`
    Assign(Var, Rhs),
    /// `skip`
    Skip,
    /// `return x`
    Return(Var),
    /// `begin var a; ... end`; the declared variables shadow enclosing scopes
    Block { vars: Vec<Var>, body: Vec<Stmt> },
    /// `if b then s1 else s2`
    If {
        cond: BoolExpr,
        then_stmt: Box<Stmt>,
        else_stmt: Box<Stmt>,
    },
    /// `while b do s`
    While { cond: BoolExpr, body: Box<Stmt> },
    /// Statements executed in order; reduction folds this away as its
    /// members finish
    Sequence(Vec<Stmt>),
    /// An expression in statement position
    Expr(Expr),
    /// Residual of a [Stmt::Block]: pops its frame when the body finishes,
    /// and lets a return value escape upward. Printed as `{ ... }`.
    BlockScoped(Box<Stmt>),
    /// Residual of a constructor or method call: pops its frame when the
    /// body finishes, discarding a void body. Printed as `[ ... ]`.
    MethodScoped(Box<Stmt>),
    /// Residual of a `return`: the produced reference, propagating upward
    /// through sequences and scoped statements
    ReturnValue(Value),
}

/// A constructor declaration. Every class has exactly one.
#[derive(Clone, Debug, PartialEq)]
pub struct CtorDecl {
    pub params: Vec<Var>,
    pub body: Stmt,
}

/// A method declaration.
#[derive(Clone, Debug, PartialEq)]
pub struct MethodDecl {
    pub name: Name,
    pub params: Vec<Var>,
    pub body: Stmt,
}

/// A class declaration: member variables, one constructor, methods.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassDecl {
    pub name: Name,
    pub vars: Vec<Var>,
    pub ctor: CtorDecl,
    pub methods: Vec<MethodDecl>,
}

/// A complete parsed program: one or more class declarations followed by the
/// initial statement (typically a `new`-expression).
#[derive(Clone, Debug, PartialEq)]
pub struct Program {
    pub classes: Vec<ClassDecl>,
    pub initial: Stmt,
}
