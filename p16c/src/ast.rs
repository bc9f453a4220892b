use std::fmt;

/// Source location of a node: byte range plus the 1-based line and 0-based
/// column of its first character.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: u32,
    pub column: u32,
}

impl Span {
    pub fn new(start: usize, end: usize, line: u32, column: u32) -> Self {
        Self {
            start,
            end,
            line,
            column,
        }
    }

    /// Span covering `self` through `other`, positioned at `self`.
    pub fn to(self, other: Span) -> Self {
        Self {
            end: other.end.max(self.end),
            ..self
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned<T> {
    pub item: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(item: T, span: Span) -> Self {
        Self { item, span }
    }
}

pub type Ident = Spanned<String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    pub body: Vec<Stmt>,
    pub span: Span,
}

/// Dotted name such as `dev.display` in `import dev.display`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    pub segments: Vec<Ident>,
    pub span: Span,
}

impl Path {
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().map(|seg| seg.item.as_str())
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for seg in &self.segments {
            if !first {
                write!(f, ".")?;
            }
            first = false;
            write!(f, "{}", seg.item)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    Import(ImportStmt),
    Assign(AssignStmt),
    AugAssign(AugAssignStmt),
    Expr(ExprStmt),
    FunctionDef(FunctionDef),
    Return(ReturnStmt),
    While(WhileStmt),
    Break(Span),
    Continue(Span),
    Pass(Span),
    /// Statement kinds the compiler does not lower (`if`, `for`, `class`, ...).
    Unsupported(UnsupportedStmt),
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Import(s) => s.span,
            Stmt::Assign(s) => s.span,
            Stmt::AugAssign(s) => s.span,
            Stmt::Expr(s) => s.span,
            Stmt::FunctionDef(s) => s.span,
            Stmt::Return(s) => s.span,
            Stmt::While(s) => s.span,
            Stmt::Break(span) | Stmt::Continue(span) | Stmt::Pass(span) => *span,
            Stmt::Unsupported(s) => s.span,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportStmt {
    pub names: Vec<ImportName>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportName {
    pub path: Path,
    pub alias: Option<Ident>,
    pub span: Span,
}

/// `a = b = value` keeps one entry per `=`; `A, B = f()` is a single tuple target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignStmt {
    pub targets: Vec<Expr>,
    pub value: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AugAssignStmt {
    pub target: Expr,
    pub op: BinaryOp,
    pub value: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExprStmt {
    pub expr: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDef {
    pub name: Ident,
    pub params: Vec<Ident>,
    pub decorators: Vec<Expr>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnStmt {
    pub value: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhileStmt {
    pub test: Expr,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedStmt {
    pub kind: &'static str,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Name(Ident),
    Attribute(AttributeExpr),
    Number(NumberExpr),
    Str(StrExpr),
    Tuple(SeqExpr),
    List(SeqExpr),
    Dict(DictExpr),
    Call(CallExpr),
    Binary(BinaryExpr),
    Unary(UnaryExpr),
    Compare(CompareExpr),
    Subscript(SubscriptExpr),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeExpr {
    pub value: Box<Expr>,
    pub attr: Ident,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberExpr {
    pub value: i64,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrExpr {
    pub value: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeqExpr {
    pub elts: Vec<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictExpr {
    pub entries: Vec<(Expr, Expr)>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallExpr {
    pub func: Box<Expr>,
    pub args: Vec<Expr>,
    pub keywords: Vec<Keyword>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyword {
    pub name: Ident,
    pub value: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryExpr {
    pub op: BinaryOp,
    pub left: Box<Expr>,
    pub right: Box<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
    Shl,
    Shr,
    BitOr,
    BitAnd,
    BitXor,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::FloorDiv => "//",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "**",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::BitOr => "|",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitXor => "^",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnaryExpr {
    pub op: UnaryOp,
    pub operand: Box<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
    Invert,
    Not,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompareExpr {
    pub left: Box<Expr>,
    pub ops: Vec<CmpOp>,
    pub comparators: Vec<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    In,
    NotIn,
    Is,
    IsNot,
}

impl CmpOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::NotEq => "!=",
            CmpOp::Lt => "<",
            CmpOp::LtE => "<=",
            CmpOp::Gt => ">",
            CmpOp::GtE => ">=",
            CmpOp::In => "in",
            CmpOp::NotIn => "not in",
            CmpOp::Is => "is",
            CmpOp::IsNot => "is not",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptExpr {
    pub value: Box<Expr>,
    pub index: Box<Expr>,
    pub span: Span,
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Name(ident) => ident.span,
            Expr::Attribute(attr) => attr.span,
            Expr::Number(num) => num.span,
            Expr::Str(s) => s.span,
            Expr::Tuple(seq) | Expr::List(seq) => seq.span,
            Expr::Dict(dict) => dict.span,
            Expr::Call(call) => call.span,
            Expr::Binary(binary) => binary.span,
            Expr::Unary(unary) => unary.span,
            Expr::Compare(cmp) => cmp.span,
            Expr::Subscript(sub) => sub.span,
        }
    }

    /// Node kind name used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Expr::Name(_) => "Name",
            Expr::Attribute(_) => "Attribute",
            Expr::Number(_) => "Number",
            Expr::Str(_) => "Str",
            Expr::Tuple(_) => "Tuple",
            Expr::List(_) => "List",
            Expr::Dict(_) => "Dict",
            Expr::Call(_) => "Call",
            Expr::Binary(_) => "BinOp",
            Expr::Unary(_) => "UnaryOp",
            Expr::Compare(_) => "Compare",
            Expr::Subscript(_) => "Subscript",
        }
    }

    /// Converts a name or attribute chain (`a.b.c`) to a Path.
    pub fn to_path(&self) -> Option<Path> {
        match self {
            Expr::Name(ident) => Some(Path {
                segments: vec![ident.clone()],
                span: ident.span,
            }),
            Expr::Attribute(attr) => {
                let mut base = attr.value.to_path()?;
                base.segments.push(attr.attr.clone());
                base.span = base.span.to(attr.attr.span);
                Some(base)
            }
            _ => None,
        }
    }
}
