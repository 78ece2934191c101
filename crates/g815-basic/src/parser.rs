//! Recursive-descent parser: tokens in, `ParsedLine` out.

use crate::ast::{
    BinOp, BuiltinFn, DelegateStmt, Expr, FileMode, LValue, LineRef, ParsedLine, PrintItem,
    PrintSep, Stmt, UnaryOp, Value,
};
use crate::errors::{BasicError, BasicResult};
use crate::lexer::{tokenize, Token};

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

/// Parse one raw input line into line number / label / statement list.
pub fn parse_line(src: &str) -> BasicResult<ParsedLine> {
    let trimmed = src.trim_start();
    let (line_number, rest) = take_line_number(trimmed)?;
    let (label, rest) = take_label(rest);

    let tokens = tokenize(rest);
    let mut parser = Parser { tokens, pos: 0 };
    let statements = parser.parse_statements()?;

    Ok(ParsedLine { line_number, label, statements })
}

fn take_line_number(src: &str) -> BasicResult<(Option<u32>, &str)> {
    let digits: String = src.chars().take_while(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return Ok((None, src));
    }
    let n: u32 = digits.parse().map_err(|_| BasicError::bad_line(format!("bad line number {digits}")))?;
    Ok((Some(n), src[digits.len()..].trim_start()))
}

fn take_label(src: &str) -> (Option<String>, &str) {
    if let Some(rest) = src.strip_prefix('*') {
        if let Some(colon) = rest.find(':') {
            let name = rest[..colon].trim().to_ascii_uppercase();
            return (Some(name), rest[colon + 1..].trim_start());
        }
    }
    (None, src)
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn eat_kw(&mut self, kw: &str) -> bool {
        if matches!(self.peek(), Some(Token::Keyword(k)) if *k == kw) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_kw(&mut self, kw: &str) -> BasicResult<()> {
        if self.eat_kw(kw) {
            Ok(())
        } else {
            Err(BasicError::syntax(format!("expected {kw}")))
        }
    }

    fn eat_op(&mut self, op: &str) -> bool {
        if matches!(self.peek(), Some(Token::Op(o)) if *o == op) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_op(&mut self, op: &str) -> BasicResult<()> {
        if self.eat_op(op) {
            Ok(())
        } else {
            Err(BasicError::syntax(format!("expected {op}")))
        }
    }

    fn eat(&mut self, tok: &Token) -> bool {
        if self.peek() == Some(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: &Token) -> BasicResult<()> {
        if self.eat(tok) {
            Ok(())
        } else {
            Err(BasicError::syntax("unexpected token"))
        }
    }

    fn at_end_of_statement(&self) -> bool {
        matches!(self.peek(), None | Some(Token::Colon))
            || matches!(self.peek(), Some(Token::Keyword("ELSE")))
    }

    fn parse_statements(&mut self) -> BasicResult<Vec<Stmt>> {
        let mut out = Vec::new();
        if self.peek().is_none() {
            return Ok(out);
        }
        loop {
            out.push(self.parse_statement()?);
            if matches!(self.peek(), Some(Token::Colon)) {
                self.pos += 1;
                if self.peek().is_none() {
                    out.push(Stmt::Empty);
                    break;
                }
                continue;
            }
            break;
        }
        Ok(out)
    }

    fn parse_statement(&mut self) -> BasicResult<Stmt> {
        match self.peek() {
            Some(Token::Keyword(kw)) => {
                let kw = *kw;
                self.pos += 1;
                self.parse_keyword_statement(kw)
            }
            Some(Token::Ident(_)) => self.parse_let_or_bare(),
            _ => Err(BasicError::bad_stmt("expected a statement")),
        }
    }

    fn parse_keyword_statement(&mut self, kw: &'static str) -> BasicResult<Stmt> {
        match kw {
            "NEW" => Ok(Stmt::New),
            "LIST" => self.parse_list(),
            "RUN" => {
                let target = self.parse_optional_line_ref()?;
                Ok(Stmt::Run { target })
            }
            "PRINT" | "GPRINT" if kw == "GPRINT" => {
                let expr = self.parse_expr()?;
                Ok(Stmt::Delegate(DelegateStmt::GPrint(expr)))
            }
            "PRINT" => self.parse_print(),
            "LET" => self.parse_let(),
            "INPUT" => self.parse_input(),
            "GOTO" => Ok(Stmt::Goto(self.parse_line_ref()?)),
            "GOSUB" => Ok(Stmt::Gosub(self.parse_line_ref()?)),
            "RETURN" => Ok(Stmt::Return),
            "IF" => self.parse_if(),
            "FOR" => self.parse_for(),
            "NEXT" => self.parse_next(),
            "DIM" => self.parse_dim(),
            "DATA" => self.parse_data(),
            "READ" => self.parse_read(),
            "RESTORE" => {
                let target = self.parse_optional_line_ref()?;
                Ok(Stmt::Restore(target))
            }
            "POKE" => self.parse_poke(),
            "PEEK" => self.parse_peek_stmt(),
            "OUT" => self.parse_out(),
            "INP" => Err(BasicError::bad_stmt("INP is an expression, not a statement")),
            "BEEP" => self.parse_beep(),
            "WAIT" => {
                if self.at_end_of_statement() {
                    Ok(Stmt::Wait(None))
                } else {
                    Ok(Stmt::Wait(Some(self.parse_expr()?)))
                }
            }
            "LOCATE" => self.parse_locate(),
            "END" => Ok(Stmt::End),
            "STOP" => Ok(Stmt::Stop),
            "CONT" => Ok(Stmt::Cont),
            "REPEAT" => Ok(Stmt::Repeat),
            "UNTIL" => Ok(Stmt::Until(self.parse_expr()?)),
            "WHILE" => Ok(Stmt::While(self.parse_expr()?)),
            "WEND" => Ok(Stmt::Wend),
            "ON" => self.parse_on(),
            "REM" => Ok(Stmt::Rem(self.rest_of_line())),
            "ELSE" => Ok(Stmt::Else),
            "AUTO" => self.parse_auto(),
            "OPEN" => self.parse_open(),
            "CLOSE" => {
                let h = if self.at_end_of_statement() { None } else { Some(self.parse_channel()?) };
                Ok(Stmt::Delegate(DelegateStmt::Close(h)))
            }
            "LOAD" => Ok(Stmt::Delegate(DelegateStmt::Load(self.parse_expr()?))),
            "SAVE" => Ok(Stmt::Delegate(DelegateStmt::Save(self.parse_expr()?))),
            "FILES" => Ok(Stmt::Delegate(DelegateStmt::Files)),
            "KILL" => Ok(Stmt::Delegate(DelegateStmt::Kill(self.parse_expr()?))),
            "BLOAD" => self.parse_bload(),
            "BSAVE" => self.parse_bsave(),
            "LCOPY" => Ok(Stmt::Delegate(DelegateStmt::Lcopy)),
            "CALL" => self.parse_call(),
            "GCURSOR" => self.parse_gcursor(),
            "LINE" => Ok(Stmt::Delegate(DelegateStmt::Line { args: self.parse_expr_list()? })),
            "PSET" => Ok(Stmt::Delegate(DelegateStmt::PSet { args: self.parse_expr_list()? })),
            "PRESET" => Ok(Stmt::Delegate(DelegateStmt::PReset { args: self.parse_expr_list()? })),
            "CIRCLE" => Ok(Stmt::Delegate(DelegateStmt::Circle { args: self.parse_expr_list()? })),
            "PAINT" => Ok(Stmt::Delegate(DelegateStmt::Paint { args: self.parse_expr_list()? })),
            _ => Err(BasicError::bad_stmt(format!("unsupported statement {kw}"))),
        }
    }

    fn rest_of_line(&mut self) -> String {
        self.pos = self.tokens.len();
        String::new()
    }

    fn parse_expr_list(&mut self) -> BasicResult<Vec<Expr>> {
        let mut out = vec![self.parse_expr()?];
        while self.eat(&Token::Comma) {
            out.push(self.parse_expr()?);
        }
        Ok(out)
    }

    fn parse_optional_line_ref(&mut self) -> BasicResult<Option<LineRef>> {
        if self.at_end_of_statement() {
            Ok(None)
        } else {
            Ok(Some(self.parse_line_ref()?))
        }
    }

    /// A line reference is either a bare line number or `*LABEL` (the `*`
    /// lexes as the multiply operator, so it's stripped here explicitly).
    fn parse_line_ref(&mut self) -> BasicResult<LineRef> {
        match self.advance() {
            Some(Token::Number(n)) => Ok(LineRef::Line(n as u32)),
            Some(Token::Op("*")) => match self.advance() {
                Some(Token::Ident(name)) => Ok(LineRef::Label(name)),
                _ => Err(BasicError::bad_line("expected a label after '*'")),
            },
            _ => Err(BasicError::bad_line("expected a line number or label")),
        }
    }

    fn parse_list(&mut self) -> BasicResult<Stmt> {
        let target = if matches!(self.peek(), Some(Token::Number(_))) {
            Some(self.parse_line_ref()?)
        } else {
            None
        };
        let printer = self.eat(&Token::Comma);
        Ok(Stmt::List { target, printer })
    }

    fn parse_channel(&mut self) -> BasicResult<Expr> {
        self.expect(&Token::Hash)?;
        self.parse_expr()
    }

    fn parse_print(&mut self) -> BasicResult<Stmt> {
        let channel = if matches!(self.peek(), Some(Token::Hash)) {
            let c = self.parse_channel()?;
            self.eat(&Token::Comma);
            Some(c)
        } else {
            None
        };
        let using = if self.eat_kw("USING") {
            let fmt = self.parse_expr()?;
            self.eat(&Token::Semicolon);
            Some(fmt)
        } else {
            None
        };

        let mut items = Vec::new();
        while !self.at_end_of_statement() {
            match self.peek() {
                Some(Token::Comma) => {
                    items.push(PrintItem::Sep(PrintSep::Comma));
                    self.pos += 1;
                }
                Some(Token::Semicolon) => {
                    items.push(PrintItem::Sep(PrintSep::Semicolon));
                    self.pos += 1;
                }
                _ => items.push(PrintItem::Expr(self.parse_expr()?)),
            }
        }
        Ok(Stmt::Print { channel, using, items })
    }

    fn parse_lvalue(&mut self) -> BasicResult<LValue> {
        let name = match self.advance() {
            Some(Token::Ident(n)) => n,
            _ => return Err(BasicError::bad_var("expected a variable name")),
        };
        if self.eat(&Token::LParen) {
            let dims = self.parse_expr_list()?;
            self.expect(&Token::RParen)?;
            Ok(LValue::ArrayElem(name, dims))
        } else {
            Ok(LValue::Scalar(name))
        }
    }

    fn parse_let(&mut self) -> BasicResult<Stmt> {
        let target = self.parse_lvalue()?;
        self.expect_op("=")?;
        let expr = self.parse_expr()?;
        Ok(Stmt::Let { target, expr })
    }

    /// A bare `A = expr` line (LET is optional).
    fn parse_let_or_bare(&mut self) -> BasicResult<Stmt> {
        self.parse_let()
    }

    fn parse_input(&mut self) -> BasicResult<Stmt> {
        let channel = if matches!(self.peek(), Some(Token::Hash)) {
            let c = self.parse_channel()?;
            self.eat(&Token::Comma);
            Some(c)
        } else {
            None
        };
        let prompt = if let Some(Token::Str(_)) = self.peek() {
            let Some(Token::Str(s)) = self.advance() else { unreachable!() };
            self.eat(&Token::Comma);
            Some(s)
        } else {
            None
        };
        let mut targets = vec![self.parse_lvalue()?];
        while self.eat(&Token::Comma) {
            targets.push(self.parse_lvalue()?);
        }
        Ok(Stmt::Input { channel, prompt, targets })
    }

    fn parse_if(&mut self) -> BasicResult<Stmt> {
        let cond = self.parse_expr()?;
        self.expect_kw("THEN")?;
        let then_branch = self.parse_then_branch()?;
        let else_branch = if self.eat_kw("ELSE") { Some(self.parse_then_branch()?) } else { None };
        Ok(Stmt::If { cond, then_branch, else_branch })
    }

    /// `THEN`/`ELSE` bodies are either a bare line number (an implicit
    /// GOTO) or a `:`-separated statement list.
    fn parse_then_branch(&mut self) -> BasicResult<Vec<Stmt>> {
        if let Some(Token::Number(n)) = self.peek() {
            let n = *n as u32;
            self.pos += 1;
            return Ok(vec![Stmt::Goto(LineRef::Line(n))]);
        }
        let mut out = Vec::new();
        loop {
            if self.at_end_of_statement() {
                break;
            }
            out.push(self.parse_statement()?);
            if matches!(self.peek(), Some(Token::Colon)) {
                self.pos += 1;
                continue;
            }
            break;
        }
        Ok(out)
    }

    fn parse_for(&mut self) -> BasicResult<Stmt> {
        let var = match self.advance() {
            Some(Token::Ident(n)) => n,
            _ => return Err(BasicError::syntax("expected a FOR variable")),
        };
        self.expect_op("=")?;
        let start = self.parse_expr()?;
        self.expect_kw("TO")?;
        let end = self.parse_expr()?;
        let step = if self.eat_kw("STEP") { Some(self.parse_expr()?) } else { None };
        Ok(Stmt::For { var, start, end, step })
    }

    fn parse_next(&mut self) -> BasicResult<Stmt> {
        if let Some(Token::Ident(n)) = self.peek() {
            let n = n.clone();
            self.pos += 1;
            Ok(Stmt::Next { var: Some(n) })
        } else {
            Ok(Stmt::Next { var: None })
        }
    }

    fn parse_dim(&mut self) -> BasicResult<Stmt> {
        let name = match self.advance() {
            Some(Token::Ident(n)) => n,
            _ => return Err(BasicError::bad_var("expected an array name")),
        };
        self.expect(&Token::LParen)?;
        let dims = self.parse_expr_list()?;
        self.expect(&Token::RParen)?;
        let str_len = if self.eat_op("*") { Some(self.parse_expr()?) } else { None };
        Ok(Stmt::Dim { name, dims, str_len })
    }

    fn parse_data(&mut self) -> BasicResult<Stmt> {
        let mut values = Vec::new();
        loop {
            match self.advance() {
                Some(Token::Number(n)) => values.push(Value::Number(n)),
                Some(Token::Str(s)) => values.push(Value::Str(s)),
                Some(Token::Ident(s)) => values.push(Value::Str(s)),
                other => return Err(BasicError::syntax(format!("bad DATA item {other:?}"))),
            }
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        Ok(Stmt::Data(values))
    }

    fn parse_read(&mut self) -> BasicResult<Stmt> {
        let mut targets = vec![self.parse_lvalue()?];
        while self.eat(&Token::Comma) {
            targets.push(self.parse_lvalue()?);
        }
        Ok(Stmt::Read(targets))
    }

    fn parse_poke(&mut self) -> BasicResult<Stmt> {
        let addr = self.parse_expr()?;
        self.expect(&Token::Comma)?;
        let values = self.parse_expr_list()?;
        Ok(Stmt::Poke { addr, values })
    }

    fn parse_peek_stmt(&mut self) -> BasicResult<Stmt> {
        // `PEEK` as a statement reads one byte into a target, distinct
        // from the `PEEK(addr)` expression form used inside expressions.
        let target = self.parse_lvalue()?;
        self.expect_op("=")?;
        self.expect_kw("PEEK")?;
        self.expect(&Token::LParen)?;
        let addr = self.parse_expr()?;
        self.expect(&Token::RParen)?;
        Ok(Stmt::Peek { target, addr })
    }

    fn parse_out(&mut self) -> BasicResult<Stmt> {
        let first = self.parse_expr()?;
        if self.eat(&Token::Comma) {
            let value = self.parse_expr()?;
            Ok(Stmt::Out { port: Some(first), value })
        } else {
            Ok(Stmt::Out { port: None, value: first })
        }
    }

    fn parse_beep(&mut self) -> BasicResult<Stmt> {
        let j = self.parse_expr()?;
        self.expect(&Token::Comma)?;
        let k = self.parse_expr()?;
        let n = if self.eat(&Token::Comma) { Some(self.parse_expr()?) } else { None };
        Ok(Stmt::Beep { j, k, n })
    }

    fn parse_locate(&mut self) -> BasicResult<Stmt> {
        let x = self.parse_expr()?;
        self.expect(&Token::Comma)?;
        let y = self.parse_expr()?;
        let z = if self.eat(&Token::Comma) { Some(self.parse_expr()?) } else { None };
        Ok(Stmt::Locate { x, y, z })
    }

    fn parse_on(&mut self) -> BasicResult<Stmt> {
        let selector = self.parse_expr()?;
        let is_gosub = if self.eat_kw("GOTO") {
            false
        } else if self.eat_kw("GOSUB") {
            true
        } else {
            return Err(BasicError::syntax("expected GOTO or GOSUB after ON"));
        };
        let mut targets = vec![self.parse_line_ref()?];
        while self.eat(&Token::Comma) {
            targets.push(self.parse_line_ref()?);
        }
        Ok(Stmt::OnGoto { selector, targets, is_gosub })
    }

    fn parse_auto(&mut self) -> BasicResult<Stmt> {
        let start = self.parse_expr()?;
        let step = if self.eat(&Token::Comma) { Some(self.parse_expr()?) } else { None };
        Ok(Stmt::Auto { start, step })
    }

    fn parse_open(&mut self) -> BasicResult<Stmt> {
        let path = self.parse_expr()?;
        self.expect_kw("FOR")?;
        let mode = match self.advance() {
            Some(Token::Ident(s)) if s == "INPUT" => FileMode::Input,
            Some(Token::Ident(s)) if s == "OUTPUT" => FileMode::Output,
            Some(Token::Ident(s)) if s == "APPEND" => FileMode::Append,
            _ => return Err(BasicError::syntax("expected INPUT/OUTPUT/APPEND")),
        };
        Ok(Stmt::Delegate(DelegateStmt::Open { path, mode }))
    }

    fn parse_bload(&mut self) -> BasicResult<Stmt> {
        let path = self.parse_expr()?;
        self.expect(&Token::Comma)?;
        let addr = self.parse_expr()?;
        Ok(Stmt::Delegate(DelegateStmt::Bload { path, addr }))
    }

    fn parse_bsave(&mut self) -> BasicResult<Stmt> {
        let path = self.parse_expr()?;
        self.expect(&Token::Comma)?;
        let addr = self.parse_expr()?;
        self.expect(&Token::Comma)?;
        let len = self.parse_expr()?;
        Ok(Stmt::Delegate(DelegateStmt::Bsave { path, addr, len }))
    }

    fn parse_call(&mut self) -> BasicResult<Stmt> {
        let addr = self.parse_expr()?;
        let mut args = Vec::new();
        while self.eat(&Token::Comma) {
            args.push(self.parse_expr()?);
        }
        Ok(Stmt::Delegate(DelegateStmt::Call { addr, args }))
    }

    fn parse_gcursor(&mut self) -> BasicResult<Stmt> {
        self.expect(&Token::LParen)?;
        let x = self.parse_expr()?;
        self.expect(&Token::Comma)?;
        let y = self.parse_expr()?;
        self.expect(&Token::RParen)?;
        Ok(Stmt::Delegate(DelegateStmt::GCursor { x, y }))
    }

    // ---- expression grammar, lowest to highest precedence ----

    fn parse_expr(&mut self) -> BasicResult<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> BasicResult<Expr> {
        let mut lhs = self.parse_xor()?;
        while self.eat_kw("OR") {
            let rhs = self.parse_xor()?;
            lhs = Expr::Binary(BinOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_xor(&mut self) -> BasicResult<Expr> {
        let mut lhs = self.parse_and()?;
        while self.eat_kw("XOR") {
            let rhs = self.parse_and()?;
            lhs = Expr::Binary(BinOp::Xor, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> BasicResult<Expr> {
        let mut lhs = self.parse_comparison()?;
        while self.eat_kw("AND") {
            let rhs = self.parse_comparison()?;
            lhs = Expr::Binary(BinOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_comparison(&mut self) -> BasicResult<Expr> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::Op("=")) => BinOp::Eq,
                Some(Token::Op("<>")) => BinOp::Ne,
                Some(Token::Op("<")) => BinOp::Lt,
                Some(Token::Op("<=")) => BinOp::Le,
                Some(Token::Op(">")) => BinOp::Gt,
                Some(Token::Op(">=")) => BinOp::Ge,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_additive()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> BasicResult<Expr> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Op("+")) => BinOp::Add,
                Some(Token::Op("-")) => BinOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> BasicResult<Expr> {
        let mut lhs = self.parse_power()?;
        loop {
            let op = match self.peek() {
                Some(Token::Op("*")) => BinOp::Mul,
                Some(Token::Op("/")) => BinOp::Div,
                Some(Token::Op("\\")) => BinOp::IDiv,
                Some(Token::Keyword("MOD")) => BinOp::Mod,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_power()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_power(&mut self) -> BasicResult<Expr> {
        let lhs = self.parse_unary()?;
        if self.eat_op("^") {
            // right-associative
            let rhs = self.parse_power()?;
            Ok(Expr::Binary(BinOp::Pow, Box::new(lhs), Box::new(rhs)))
        } else {
            Ok(lhs)
        }
    }

    fn parse_unary(&mut self) -> BasicResult<Expr> {
        if self.eat_op("-") {
            Ok(Expr::Unary(UnaryOp::Neg, Box::new(self.parse_unary()?)))
        } else if self.eat_op("+") {
            Ok(Expr::Unary(UnaryOp::Pos, Box::new(self.parse_unary()?)))
        } else if self.eat_kw("NOT") {
            Ok(Expr::Unary(UnaryOp::Not, Box::new(self.parse_unary()?)))
        } else {
            self.parse_primary()
        }
    }

    fn parse_primary(&mut self) -> BasicResult<Expr> {
        match self.advance() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Str(s)) => Ok(Expr::Str(s)),
            Some(Token::LParen) => {
                let e = self.parse_expr()?;
                self.expect(&Token::RParen)?;
                Ok(e)
            }
            Some(Token::Keyword("INP")) => self.parse_call_args(BuiltinFn::Inp),
            Some(Token::Keyword("PEEK")) => self.parse_call_args(BuiltinFn::Peek),
            Some(Token::Keyword("INKEY")) => Ok(Expr::Call(BuiltinFn::Peek, vec![Expr::Number(-1.0)])),
            Some(Token::Ident(name)) => self.parse_ident_primary(name),
            other => Err(BasicError::syntax(format!("unexpected token in expression: {other:?}"))),
        }
    }

    fn parse_ident_primary(&mut self, name: String) -> BasicResult<Expr> {
        let upper = name.to_ascii_uppercase();
        let builtin = match upper.trim_end_matches('$') {
            "ABS" => Some(BuiltinFn::Abs),
            "INT" => Some(BuiltinFn::Int),
            "RND" => Some(BuiltinFn::Rnd),
            "LEN" => Some(BuiltinFn::Len),
            "CHR" if upper.ends_with('$') => Some(BuiltinFn::Chr),
            "ASC" => Some(BuiltinFn::Asc),
            "STR" if upper.ends_with('$') => Some(BuiltinFn::StrDollar),
            "VAL" => Some(BuiltinFn::Val),
            "LEFT" if upper.ends_with('$') => Some(BuiltinFn::Left),
            "RIGHT" if upper.ends_with('$') => Some(BuiltinFn::Right),
            "MID" if upper.ends_with('$') => Some(BuiltinFn::Mid),
            _ => None,
        };
        if let Some(f) = builtin {
            if matches!(self.peek(), Some(Token::LParen)) {
                return self.parse_call_args(f);
            }
        }
        if self.eat(&Token::LParen) {
            let dims = self.parse_expr_list()?;
            self.expect(&Token::RParen)?;
            Ok(Expr::ArrayElem(upper, dims))
        } else {
            Ok(Expr::Var(upper))
        }
    }

    fn parse_call_args(&mut self, f: BuiltinFn) -> BasicResult<Expr> {
        self.expect(&Token::LParen)?;
        let args = if matches!(self.peek(), Some(Token::RParen)) {
            Vec::new()
        } else {
            self.parse_expr_list()?
        };
        self.expect(&Token::RParen)?;
        Ok(Expr::Call(f, args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_let_expression() {
        let line = parse_line("LET A=(2+3)*4").unwrap();
        assert_eq!(line.statements.len(), 1);
        assert!(matches!(&line.statements[0], Stmt::Let { .. }));
    }

    #[test]
    fn parses_numbered_line_with_multiple_statements() {
        let line = parse_line("10 A=1:PRINT A").unwrap();
        assert_eq!(line.line_number, Some(10));
        assert_eq!(line.statements.len(), 2);
    }

    #[test]
    fn parses_inline_if_else() {
        let line = parse_line("IF A THEN PRINT 1 ELSE PRINT 2").unwrap();
        let Stmt::If { else_branch, .. } = &line.statements[0] else { panic!() };
        assert!(else_branch.is_some());
    }

    #[test]
    fn parses_for_with_step() {
        let line = parse_line("FOR I=1 TO 2 STEP 0").unwrap();
        assert!(matches!(&line.statements[0], Stmt::For { .. }));
    }

    #[test]
    fn parses_on_goto_list() {
        let line = parse_line("ON X GOTO 10,20,30").unwrap();
        let Stmt::OnGoto { targets, is_gosub, .. } = &line.statements[0] else { panic!() };
        assert_eq!(targets.len(), 3);
        assert!(!is_gosub);
    }
}
