use crate::tokens::Token;
use std::fmt;
use std::rc::Rc;

/// Stable identity of a variable-use site, assigned by the parser and used
/// as the key of the interpreter's resolved-locals map.
pub type ExprId = usize;

#[derive(Debug, Clone)]
pub enum Expr {
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
    Binary(Box<Expr>, Token, Box<Expr>),
    Logical(Box<Expr>, Token, Box<Expr>),
    Unary(Token, Box<Expr>),
    Grouping(Box<Expr>),
    Literal(Token),
    Variable(ExprId, Token),
    Assign(ExprId, Token, Box<Expr>),
    Call(Box<Expr>, Token, Vec<Expr>),
    Get(Box<Expr>, Token),
    Set(Box<Expr>, Token, Box<Expr>),
    This(ExprId, Token),
    Super(ExprId, Token, Token),
}

#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub name: Token,
    pub params: Vec<Token>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Expression(Expr),
    Print(Expr),
    Var(Token, Option<Expr>),
    Block(Vec<Stmt>),
    If(Expr, Box<Stmt>, Option<Box<Stmt>>),
    While(Expr, Box<Stmt>),
    Break(Token),
    Function(Rc<FunctionDecl>),
    Return(Token, Option<Expr>),
    Class(Token, Option<Expr>, Vec<Rc<FunctionDecl>>),
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ternary(cond, then_branch, else_branch) => {
                write!(f, "(? {} {} {})", cond, then_branch, else_branch)
            }
            Self::Binary(left, t, right) => write!(f, "({} {} {})", t, left, right),
            Self::Logical(left, t, right) => write!(f, "({} {} {})", t, left, right),
            Self::Unary(t, e) => write!(f, "({} {})", t, e),
            Self::Literal(t) => write!(f, "{}", t),
            Self::Grouping(e) => write!(f, "(group {})", e),
            Self::Variable(_, n) => write!(f, "{}", n),
            Self::Assign(_, n, v) => write!(f, "(= {} {})", n, v),
            Self::Call(callee, _, args) => {
                write!(f, "(call {}", callee)?;
                for arg in args {
                    write!(f, " {}", arg)?;
                }
                write!(f, ")")
            }
            Self::Get(obj, name) => write!(f, "(. {} {})", obj, name),
            Self::Set(obj, name, value) => write!(f, "(.= {} {} {})", obj, name, value),
            Self::This(_, keyword) => write!(f, "{}", keyword),
            Self::Super(_, _, method) => write!(f, "(super {})", method),
        }
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expression(e) => write!(f, "{};", e),
            Self::Print(e) => write!(f, "(print {})", e),
            Self::Var(n, Some(e)) => write!(f, "(var {} {})", n, e),
            Self::Var(n, None) => write!(f, "(var {})", n),
            Self::Block(stmts) => {
                write!(f, "{{")?;
                for s in stmts {
                    write!(f, " {}", s)?;
                }
                write!(f, " }}")
            }
            Self::If(c, t, Some(e)) => write!(f, "(if {} {} {})", c, t, e),
            Self::If(c, t, None) => write!(f, "(if {} {})", c, t),
            Self::While(c, body) => write!(f, "(while {} {})", c, body),
            Self::Break(_) => write!(f, "(break)"),
            Self::Function(decl) => write!(f, "(fun {})", decl.name),
            Self::Return(_, Some(e)) => write!(f, "(return {})", e),
            Self::Return(_, None) => write!(f, "(return)"),
            Self::Class(name, Some(superclass), _) => {
                write!(f, "(class {} < {})", name, superclass)
            }
            Self::Class(name, None, _) => write!(f, "(class {})", name),
        }
    }
}
