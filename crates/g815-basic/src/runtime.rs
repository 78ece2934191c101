//! The interactive runtime: immediate-mode execution, the numbered-line
//! program store, and the cooperative pump loop that drives RUN/CONT/WAIT/
//! INPUT/STOP suspension without threads or generators.

use std::collections::VecDeque;

use crate::adapter::MachineAdapter;
use crate::ast::{DelegateStmt, Expr, FileMode, LValue, LineRef, PrintItem, PrintSep, Stmt, Value};
use crate::errors::{BasicError, BasicResult};
use crate::eval::{eval, format_number, EvalCtx};
use crate::parser::parse_line;
use crate::program::{DataPool, Program};
use crate::vars::VarStore;

/// A position within the program: a line number plus the index of the
/// statement within that line's `:`-separated list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pc {
    pub line: u32,
    pub stmt: usize,
}

#[derive(Debug, Clone)]
struct ForFrame {
    var: String,
    body_pc: Pc,
    end: f64,
    step: f64,
}

/// Why the pump returned control to the host without finishing the
/// program.
#[derive(Debug, Clone, PartialEq)]
pub enum Suspension {
    /// Resume automatically once `now_ms >= resume_at_ms`.
    Wait { resume_at_ms: u64 },
    /// Resume when the host delivers an input line via `provide_input`.
    Input { targets: Vec<LValue> },
    /// Resume only when the host calls `cont()`.
    Break,
}

#[derive(Debug, Clone, PartialEq)]
enum Outcome {
    Continue,
    Jump(Pc),
    EndProgram,
    Suspend(Suspension),
    /// A `WAIT n` statement just ran; `delay_ms` is relative to whatever
    /// `now_ms` the pump is at when it observes this, not an absolute time.
    SuspendWait { delay_ms: u64 },
}

struct ActiveProgram {
    pc: Pc,
    step_count: u32,
    suspended: Option<Suspension>,
    run_token: u64,
}

/// The BASIC interpreter: program store, variables, and the pump loop,
/// parameterized over the machine adapter it drives I/O through.
pub struct Runtime<A: MachineAdapter> {
    pub program: Program,
    pub vars: VarStore,
    data_pool: DataPool,
    for_stack: Vec<ForFrame>,
    gosub_stack: Vec<Pc>,
    repeat_stack: Vec<Pc>,
    while_stack: Vec<Pc>,
    output: VecDeque<u8>,
    pending_input_line: Option<String>,
    active: Option<ActiveProgram>,
    run_token: u64,
    pub runaway_limit: u32,
    adapter: A,
    rng_state: u64,
}

impl<A: MachineAdapter> Runtime<A> {
    #[must_use]
    pub fn new(adapter: A) -> Self {
        Self {
            program: Program::new(),
            vars: VarStore::new(),
            data_pool: DataPool::default(),
            for_stack: Vec::new(),
            gosub_stack: Vec::new(),
            repeat_stack: Vec::new(),
            while_stack: Vec::new(),
            output: VecDeque::new(),
            pending_input_line: None,
            active: None,
            run_token: 0,
            runaway_limit: 50_000,
            adapter,
            rng_state: 0x9E37_79B9_7F4A_7C15,
        }
    }

    #[must_use]
    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn adapter_mut(&mut self) -> &mut A {
        &mut self.adapter
    }

    /// Detach the current adapter and reattach a different one, carrying
    /// every other field across unchanged. Lets a host swap in a borrowing
    /// adapter for the duration of one call, then swap back to a
    /// long-lived placeholder without losing program or variable state.
    pub fn swap_adapter<B: MachineAdapter>(self, new_adapter: B) -> (Runtime<B>, A) {
        let Runtime {
            program,
            vars,
            data_pool,
            for_stack,
            gosub_stack,
            repeat_stack,
            while_stack,
            output,
            pending_input_line,
            active,
            run_token,
            runaway_limit,
            adapter,
            rng_state,
        } = self;
        (
            Runtime {
                program,
                vars,
                data_pool,
                for_stack,
                gosub_stack,
                repeat_stack,
                while_stack,
                output,
                pending_input_line,
                active,
                run_token,
                runaway_limit,
                adapter: new_adapter,
                rng_state,
            },
            adapter,
        )
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.active.as_ref().is_some_and(|a| a.suspended.is_none())
    }

    #[must_use]
    pub fn is_suspended(&self) -> bool {
        self.active.as_ref().is_some_and(|a| a.suspended.is_some())
    }

    /// Drain all output FIFO bytes produced so far.
    pub fn take_output(&mut self) -> Vec<u8> {
        self.output.drain(..).collect()
    }

    /// Read the output FIFO without draining it, for snapshotting.
    #[must_use]
    pub fn peek_output(&self) -> Vec<u8> {
        self.output.iter().copied().collect()
    }

    /// Replace the output FIFO wholesale, as when restoring a snapshot.
    pub fn set_output(&mut self, bytes: Vec<u8>) {
        self.output = bytes.into();
    }

    /// The input line delivered by the host but not yet consumed by the
    /// running `INPUT` statement, if any.
    #[must_use]
    pub fn pending_input(&self) -> Option<&str> {
        self.pending_input_line.as_deref()
    }

    pub fn set_pending_input(&mut self, line: Option<String>) {
        self.pending_input_line = line;
    }

    /// Variable names awaited by a suspended `INPUT`, for display prompts.
    #[must_use]
    pub fn waiting_input_vars(&self) -> Option<Vec<String>> {
        match self.active.as_ref()?.suspended.as_ref()? {
            Suspension::Input { targets } => Some(targets.iter().map(lvalue_name).collect()),
            _ => None,
        }
    }

    fn emit(&mut self, text: &str) {
        self.output.extend(text.as_bytes());
    }

    fn emit_line(&mut self, text: &str) {
        self.emit(text);
        self.output.push_back(b'\n');
    }

    fn push_status(&mut self, status: &str, prompt: bool) {
        self.emit_line(status);
        if prompt {
            self.emit(">");
        }
    }

    // ---- immediate mode ----

    /// Feed one line of input. A leading line number stores (or deletes)
    /// a program line; anything else is parsed and executed immediately.
    pub fn submit_line(&mut self, src: &str) {
        let trimmed = src.trim();
        let starts_with_digit = trimmed.chars().next().is_some_and(|c| c.is_ascii_digit());
        if starts_with_digit {
            if let Some((number, rest)) = split_line_number(trimmed) {
                if let Err(e) = self.program.store_line(number, rest) {
                    self.push_status(&format!("ERR {e}"), true);
                }
                return;
            }
        }

        if matches!(
            self.active.as_ref().and_then(|a| a.suspended.as_ref()),
            Some(Suspension::Input { .. })
        ) {
            self.provide_input(trimmed);
            return;
        }

        match parse_line(trimmed) {
            Ok(parsed) => {
                for stmt in &parsed.statements {
                    match self.exec_immediate(stmt) {
                        Ok(()) => {}
                        Err(e) => {
                            self.push_status(&format!("ERR {e}"), true);
                            return;
                        }
                    }
                }
            }
            Err(e) => self.push_status(&format!("ERR {e}"), true),
        }
    }

    fn exec_immediate(&mut self, stmt: &Stmt) -> BasicResult<()> {
        match stmt {
            Stmt::Run { target } => self.start_run(target.clone()),
            Stmt::List { target, .. } => {
                let from = target.as_ref().map(|t| self.program.resolve(t)).transpose()?;
                for line in self.program.listing(from) {
                    self.emit_line(&line);
                }
                Ok(())
            }
            Stmt::New => {
                self.program.clear();
                self.vars.clear();
                self.data_pool = DataPool::default();
                self.active = None;
                Ok(())
            }
            Stmt::Cont => {
                self.cont();
                Ok(())
            }
            other => {
                let pc = Pc { line: 0, stmt: 0 };
                match self.exec_stmt(other, pc)? {
                    Outcome::Suspend(_) | Outcome::SuspendWait { .. } => {
                        Err(BasicError::bad_stmt("statement requires a running program"))
                    }
                    _ => Ok(()),
                }
            }
        }
    }

    fn start_run(&mut self, target: Option<LineRef>) -> BasicResult<()> {
        let start_line = match target {
            Some(t) => self.program.resolve(&t)?,
            None => self.program.first_line().ok_or_else(|| BasicError::bad_stmt("no program"))?,
        };
        self.vars.clear();
        self.for_stack.clear();
        self.gosub_stack.clear();
        self.repeat_stack.clear();
        self.while_stack.clear();
        self.data_pool = self.program.build_data_pool();
        self.run_token += 1;
        self.active = Some(ActiveProgram {
            pc: Pc { line: start_line, stmt: 0 },
            step_count: 0,
            suspended: None,
            run_token: self.run_token,
        });
        Ok(())
    }

    /// Resume a `STOP`-suspended program from the statement after STOP.
    pub fn cont(&mut self) {
        if let Some(active) = &mut self.active {
            if matches!(active.suspended, Some(Suspension::Break)) {
                active.suspended = None;
            }
        }
    }

    pub fn provide_input(&mut self, line: &str) {
        self.pending_input_line = Some(line.to_string());
        if let Some(active) = &mut self.active {
            active.suspended = None;
        }
    }

    /// Bump the run-token, cooperatively cancelling whatever is active.
    pub fn cancel(&mut self) {
        self.run_token += 1;
        self.active = None;
    }

    // ---- pump loop ----

    /// Advance the running program by as much work as `now_ms` allows.
    /// Returns once the program ends, suspends, or the runaway guard trips.
    pub fn pump(&mut self, now_ms: u64) {
        loop {
            let Some(active) = &self.active else { return };
            if active.run_token != self.run_token {
                self.active = None;
                return;
            }
            let suspended = active.suspended.clone();
            match suspended {
                None => {}
                Some(Suspension::Wait { resume_at_ms }) => {
                    if now_ms < resume_at_ms {
                        return;
                    }
                    if let Some(a) = &mut self.active {
                        a.suspended = None;
                        a.step_count = 0;
                    }
                }
                Some(_) => return,
            }

            let pc = self.active.as_ref().unwrap().pc;
            let Some(line) = self.program.lines().get(&pc.line).cloned() else {
                self.finish_program("OK");
                return;
            };
            let Some(stmt) = line.statements.get(pc.stmt).cloned() else {
                self.advance_to_next_line(pc.line);
                continue;
            };

            let step_count = {
                let a = self.active.as_mut().unwrap();
                a.step_count += 1;
                a.step_count
            };
            if step_count > self.runaway_limit {
                self.finish_program_err(BasicError::runaway());
                return;
            }

            match self.exec_stmt(&stmt, pc) {
                Ok(Outcome::Continue) => self.advance_pc(pc),
                Ok(Outcome::Jump(target)) => {
                    if let Some(a) = &mut self.active {
                        a.pc = target;
                    }
                }
                Ok(Outcome::EndProgram) => {
                    self.finish_program("OK");
                    return;
                }
                Ok(Outcome::SuspendWait { delay_ms }) => {
                    self.advance_pc(pc);
                    let resume_at_ms = now_ms + delay_ms;
                    if let Some(a) = &mut self.active {
                        a.suspended = Some(Suspension::Wait { resume_at_ms });
                        a.step_count = 0;
                    }
                    if resume_at_ms <= now_ms {
                        continue;
                    }
                    return;
                }
                Ok(Outcome::Suspend(s @ Suspension::Input { .. })) => {
                    self.advance_pc(pc);
                    if let Some(a) = &mut self.active {
                        a.suspended = Some(s);
                    }
                    return;
                }
                Ok(Outcome::Suspend(Suspension::Break)) => {
                    self.advance_pc(pc);
                    if let Some(a) = &mut self.active {
                        a.suspended = Some(Suspension::Break);
                    }
                    self.push_status("BREAK", false);
                    return;
                }
                Ok(Outcome::Suspend(Suspension::Wait { .. })) => {
                    unreachable!("WAIT statements produce Outcome::SuspendWait, not Outcome::Suspend")
                }
                Err(e) => {
                    self.finish_program_err(e);
                    return;
                }
            }
        }
    }

    fn advance_to_next_line(&mut self, line: u32) {
        match self.program.next_line_after(line) {
            Some(next) => {
                if let Some(a) = &mut self.active {
                    a.pc = Pc { line: next, stmt: 0 };
                }
            }
            None => self.finish_program("OK"),
        }
    }

    fn advance_pc(&mut self, pc: Pc) {
        let Some(line) = self.program.lines().get(&pc.line) else {
            self.finish_program("OK");
            return;
        };
        if pc.stmt + 1 < line.statements.len() {
            if let Some(a) = &mut self.active {
                a.pc = Pc { line: pc.line, stmt: pc.stmt + 1 };
            }
        } else {
            self.advance_to_next_line(pc.line);
        }
    }

    fn finish_program(&mut self, status: &str) {
        self.active = None;
        self.push_status(status, true);
    }

    fn finish_program_err(&mut self, e: BasicError) {
        self.active = None;
        self.push_status(&format!("ERR {e}"), true);
    }

    fn next_pc(&self, pc: Pc) -> Option<Pc> {
        let line = self.program.lines().get(&pc.line)?;
        if pc.stmt + 1 < line.statements.len() {
            Some(Pc { line: pc.line, stmt: pc.stmt + 1 })
        } else {
            self.program.next_line_after(pc.line).map(|n| Pc { line: n, stmt: 0 })
        }
    }

    /// Scan forward from `from` (exclusive) for the first `close_is` match
    /// at the same nesting depth, honoring `open_is` nesting.
    fn scan_forward(&self, from: Pc, open_is: fn(&Stmt) -> bool, close_is: fn(&Stmt) -> bool) -> Option<Pc> {
        let mut depth = 0i32;
        let mut cur = self.next_pc(from)?;
        loop {
            let line = self.program.lines().get(&cur.line)?;
            let stmt = line.statements.get(cur.stmt)?;
            if open_is(stmt) {
                depth += 1;
            } else if close_is(stmt) {
                if depth == 0 {
                    return Some(cur);
                }
                depth -= 1;
            }
            cur = self.next_pc(cur)?;
        }
    }

    // ---- statement execution ----

    fn exec_stmt(&mut self, stmt: &Stmt, pc: Pc) -> BasicResult<Outcome> {
        match stmt {
            Stmt::Empty | Stmt::Rem(_) | Stmt::Else => Ok(Outcome::Continue),
            Stmt::New => {
                self.program.clear();
                self.vars.clear();
                Ok(Outcome::Continue)
            }
            Stmt::End => Ok(Outcome::EndProgram),
            Stmt::Stop => Ok(Outcome::Suspend(Suspension::Break)),
            Stmt::Cont => Ok(Outcome::Continue),
            Stmt::Goto(target) => Ok(Outcome::Jump(Pc { line: self.program.resolve(target)?, stmt: 0 })),
            Stmt::Gosub(target) => {
                let next = self.next_pc(pc).unwrap_or(pc);
                self.gosub_stack.push(next);
                Ok(Outcome::Jump(Pc { line: self.program.resolve(target)?, stmt: 0 }))
            }
            Stmt::Return => {
                let target = self.gosub_stack.pop().ok_or_else(BasicError::return_wo_gosub)?;
                Ok(Outcome::Jump(target))
            }
            Stmt::Let { target, expr } => {
                let v = self.eval_expr(expr)?;
                self.assign(target, v)?;
                Ok(Outcome::Continue)
            }
            Stmt::Print { channel, using, items } => self.exec_print(channel.as_ref(), using.as_ref(), items),
            Stmt::If { cond, then_branch, else_branch } => {
                if self.eval_expr(cond)?.truthy() {
                    self.exec_block(then_branch, pc)
                } else if let Some(else_b) = else_branch {
                    self.exec_block(else_b, pc)
                } else {
                    Ok(Outcome::Continue)
                }
            }
            Stmt::For { var, start, end, step } => {
                let start_v = self.eval_expr(start)?.as_number();
                let end_v = self.eval_expr(end)?.as_number();
                let step_v =
                    step.as_ref().map(|s| self.eval_expr(s)).transpose()?.map(|v| v.as_number()).unwrap_or(1.0);
                self.vars.set_scalar(var, Value::Number(start_v))?;
                let body_pc = self.next_pc(pc).unwrap_or(pc);
                self.for_stack.push(ForFrame { var: var.clone(), body_pc, end: end_v, step: step_v });
                Ok(Outcome::Continue)
            }
            Stmt::Next { var } => self.exec_next(var.as_deref()),
            Stmt::Dim { name, dims, str_len } => {
                let dim_sizes: Vec<usize> =
                    dims.iter().map(|e| Ok(self.eval_expr(e)?.as_int().max(0) as usize)).collect::<BasicResult<_>>()?;
                let len =
                    str_len.as_ref().map(|e| self.eval_expr(e)).transpose()?.map(|v| v.as_int().max(0) as usize);
                self.vars.dim(name, dim_sizes, len)?;
                Ok(Outcome::Continue)
            }
            Stmt::Data(_) => Ok(Outcome::Continue),
            Stmt::Read(targets) => {
                for t in targets {
                    let v = self.data_pool.read_next()?;
                    self.assign(t, v)?;
                }
                Ok(Outcome::Continue)
            }
            Stmt::Restore(target) => {
                let line = target.as_ref().map(|t| self.program.resolve(t)).transpose()?;
                self.data_pool.restore(line);
                Ok(Outcome::Continue)
            }
            Stmt::Poke { addr, values } => {
                let base = self.eval_expr(addr)?.as_int() as u16;
                for (i, v) in values.iter().enumerate() {
                    let byte = self.eval_expr(v)?.as_int() as u8;
                    self.adapter.poke8(base.wrapping_add(i as u16), byte);
                }
                Ok(Outcome::Continue)
            }
            Stmt::Peek { target, addr } => {
                let a = self.eval_expr(addr)?.as_int() as u16;
                let byte = self.adapter.peek8(a);
                self.assign(target, Value::Number(f64::from(byte)))?;
                Ok(Outcome::Continue)
            }
            Stmt::Out { port, value } => {
                let p = port.as_ref().map(|e| self.eval_expr(e)).transpose()?.map(|v| v.as_int() as u16).unwrap_or(0);
                let v = self.eval_expr(value)?.as_int() as u8;
                self.adapter.out8(p, v);
                Ok(Outcome::Continue)
            }
            Stmt::Beep { j, k, n } => {
                let _ = (self.eval_expr(j)?, self.eval_expr(k)?);
                let ms =
                    n.as_ref().map(|e| self.eval_expr(e)).transpose()?.map(|v| v.as_int().max(0) as u32).unwrap_or(0);
                self.adapter.sleep_ms(ms);
                Ok(Outcome::Continue)
            }
            Stmt::Wait(n) => match n {
                None => {
                    self.adapter.wait_for_enter_key();
                    Ok(Outcome::Continue)
                }
                Some(e) => {
                    let delay_ms = self.eval_expr(e)?.as_int().max(0) as u64;
                    Ok(Outcome::SuspendWait { delay_ms })
                }
            },
            Stmt::Locate { x, y, z } => {
                let col = self.eval_expr(x)?.as_int().clamp(0, 23) as u8;
                let row = self.eval_expr(y)?.as_int().clamp(0, 3) as u8;
                if let Some(z) = z {
                    let _ = self.eval_expr(z)?;
                }
                self.adapter.set_text_cursor(col, row);
                Ok(Outcome::Continue)
            }
            Stmt::Repeat => {
                let body_pc = self.next_pc(pc).unwrap_or(pc);
                self.repeat_stack.push(body_pc);
                Ok(Outcome::Continue)
            }
            Stmt::Until(cond) => {
                let done = self.eval_expr(cond)?.truthy();
                if done {
                    self.repeat_stack.pop();
                    Ok(Outcome::Continue)
                } else {
                    let target =
                        *self.repeat_stack.last().ok_or_else(|| BasicError::bad_stmt("UNTIL without REPEAT"))?;
                    Ok(Outcome::Jump(target))
                }
            }
            Stmt::While(cond) => {
                if self.eval_expr(cond)?.truthy() {
                    self.while_stack.push(pc);
                    Ok(Outcome::Continue)
                } else {
                    let after_wend = self
                        .scan_forward(pc, |s| matches!(s, Stmt::While(_)), |s| matches!(s, Stmt::Wend))
                        .ok_or_else(|| BasicError::bad_stmt("WHILE without matching WEND"))?;
                    Ok(Outcome::Jump(self.next_pc(after_wend).unwrap_or(after_wend)))
                }
            }
            Stmt::Wend => {
                let target = self.while_stack.pop().ok_or_else(|| BasicError::bad_stmt("WEND without WHILE"))?;
                Ok(Outcome::Jump(target))
            }
            Stmt::OnGoto { selector, targets, is_gosub } => {
                let idx = self.eval_expr(selector)?.as_int();
                if idx < 1 || (idx as usize) > targets.len() {
                    return Ok(Outcome::Continue);
                }
                let target = &targets[idx as usize - 1];
                if *is_gosub {
                    let next = self.next_pc(pc).unwrap_or(pc);
                    self.gosub_stack.push(next);
                }
                Ok(Outcome::Jump(Pc { line: self.program.resolve(target)?, stmt: 0 }))
            }
            Stmt::Input { channel, prompt, targets } => {
                if channel.is_none() {
                    if let Some(p) = prompt {
                        self.emit(p);
                    }
                }
                if let Some(line) = self.pending_input_line.take() {
                    self.distribute_input(&line, targets)?;
                    return Ok(Outcome::Continue);
                }
                Ok(Outcome::Suspend(Suspension::Input { targets: targets.clone() }))
            }
            Stmt::Auto { .. } | Stmt::List { .. } | Stmt::Run { .. } => {
                Err(BasicError::bad_stmt("statement is immediate-mode only"))
            }
            Stmt::Delegate(d) => self.exec_delegate(d),
        }
    }

    fn exec_block(&mut self, stmts: &[Stmt], pc: Pc) -> BasicResult<Outcome> {
        for s in stmts {
            match self.exec_stmt(s, pc)? {
                Outcome::Continue => {}
                other => return Ok(other),
            }
        }
        Ok(Outcome::Continue)
    }

    fn exec_next(&mut self, var: Option<&str>) -> BasicResult<Outcome> {
        let frame = match var {
            Some(name) => {
                let idx =
                    self.for_stack.iter().rposition(|f| f.var == name).ok_or_else(BasicError::next_without_for)?;
                self.for_stack.truncate(idx + 1);
                self.for_stack.pop().unwrap()
            }
            None => self.for_stack.pop().ok_or_else(BasicError::next_without_for)?,
        };
        let current = self.vars.get_scalar(&frame.var).as_number();
        let updated = current + frame.step;
        let in_range = if frame.step >= 0.0 { updated <= frame.end } else { updated >= frame.end };
        self.vars.set_scalar(&frame.var, Value::Number(updated))?;
        if in_range {
            let body_pc = frame.body_pc;
            self.for_stack.push(frame);
            Ok(Outcome::Jump(body_pc))
        } else {
            Ok(Outcome::Continue)
        }
    }

    fn distribute_input(&mut self, line: &str, targets: &[LValue]) -> BasicResult<()> {
        let parts: Vec<&str> = split_outside_quotes(line, ',');
        for (i, target) in targets.iter().enumerate() {
            let raw = parts.get(i).copied().unwrap_or("").trim();
            let is_string_target = match target {
                LValue::Scalar(n) | LValue::ArrayElem(n, _) => n.ends_with('$'),
            };
            let value = if is_string_target {
                Value::Str(raw.to_string())
            } else {
                Value::Number(raw.parse().unwrap_or(0.0))
            };
            self.assign(target, value)?;
        }
        Ok(())
    }

    fn exec_print(&mut self, channel: Option<&Expr>, using: Option<&Expr>, items: &[PrintItem]) -> BasicResult<Outcome> {
        if let Some(ch) = channel {
            let _ = self.eval_expr(ch)?;
        }
        let fmt = using.map(|e| self.eval_expr(e)).transpose()?;
        let mut rendered = String::new();
        let mut trailing_sep = false;
        for item in items {
            match item {
                PrintItem::Expr(e) => {
                    let v = self.eval_expr(e)?;
                    rendered.push_str(&render_print_value(&v, fmt.as_ref()));
                    trailing_sep = false;
                }
                PrintItem::Sep(PrintSep::Comma) => {
                    let col = rendered.chars().count() % 8;
                    rendered.push_str(&" ".repeat(8 - col));
                    trailing_sep = true;
                }
                PrintItem::Sep(PrintSep::Semicolon) => {
                    trailing_sep = true;
                }
            }
        }
        self.emit(&rendered);
        if !trailing_sep {
            self.output.push_back(b'\n');
        }
        Ok(Outcome::Continue)
    }

    fn exec_delegate(&mut self, d: &DelegateStmt) -> BasicResult<Outcome> {
        match d {
            DelegateStmt::Open { path, mode } => {
                if let Value::Str(s) = self.eval_expr(path)? {
                    self.adapter.open_file(&s, *mode);
                }
            }
            DelegateStmt::Close(h) => {
                if let Some(e) = h {
                    let v = self.eval_expr(e)?.as_int() as u32;
                    self.adapter.close_file(v);
                }
            }
            DelegateStmt::Load(e) => {
                if let Value::Str(s) = self.eval_expr(e)? {
                    self.adapter.open_file(&s, FileMode::Input);
                }
            }
            DelegateStmt::Save(e) => {
                if let Value::Str(s) = self.eval_expr(e)? {
                    self.adapter.open_file(&s, FileMode::Output);
                }
            }
            DelegateStmt::Files => {
                for f in self.adapter.list_files() {
                    self.emit_line(&f);
                }
            }
            DelegateStmt::Kill(e) => {
                if let Value::Str(s) = self.eval_expr(e)? {
                    self.adapter.delete_file(&s);
                }
            }
            DelegateStmt::Bload { path, addr } | DelegateStmt::Bsave { path, addr, .. } => {
                let _ = (self.eval_expr(path)?, self.eval_expr(addr)?);
            }
            DelegateStmt::Lcopy => {}
            DelegateStmt::Call { addr, args } => {
                let a = self.eval_expr(addr)?.as_int() as u16;
                let arg_values: Vec<f64> =
                    args.iter().map(|e| self.eval_expr(e).map(|v| v.as_number())).collect::<BasicResult<_>>()?;
                self.adapter.call_machine(a, &arg_values);
            }
            DelegateStmt::GCursor { x, y } => {
                let xv = self.eval_expr(x)?.as_int();
                let yv = self.eval_expr(y)?.as_int();
                self.adapter.set_graphic_cursor(xv, yv);
            }
            DelegateStmt::GPrint(e) => {
                if let Value::Str(s) = self.eval_expr(e)? {
                    self.adapter.print_graphic_text(&s);
                }
            }
            DelegateStmt::Line { args } => {
                let v = self.eval_points(args)?;
                self.adapter.draw_line(
                    v.first().copied().unwrap_or(0),
                    v.get(1).copied().unwrap_or(0),
                    v.get(2).copied().unwrap_or(0),
                    v.get(3).copied().unwrap_or(0),
                    1,
                    None,
                );
            }
            DelegateStmt::PSet { args } | DelegateStmt::PReset { args } => {
                let v = self.eval_points(args)?;
                self.adapter.draw_point(v.first().copied().unwrap_or(0), v.get(1).copied().unwrap_or(0), None);
            }
            DelegateStmt::Circle { args } | DelegateStmt::Paint { args } => {
                for a in args {
                    let _ = self.eval_expr(a)?;
                }
            }
        }
        Ok(Outcome::Continue)
    }

    fn eval_points(&mut self, args: &[Expr]) -> BasicResult<Vec<i32>> {
        args.iter().map(|e| Ok(self.eval_expr(e)?.as_int())).collect()
    }

    fn assign(&mut self, target: &LValue, value: Value) -> BasicResult<()> {
        match target {
            LValue::Scalar(name) => self.vars.set_scalar(name, value),
            LValue::ArrayElem(name, idx_exprs) => {
                let indices: Vec<usize> = idx_exprs
                    .iter()
                    .map(|e| Ok(self.eval_expr(e)?.as_int().max(0) as usize))
                    .collect::<BasicResult<_>>()?;
                self.vars.set_array_elem(name, &indices, value)
            }
        }
    }

    fn eval_expr(&mut self, expr: &Expr) -> BasicResult<Value> {
        let mut ctx = EvalCtx { vars: &mut self.vars, adapter: &mut self.adapter, rng_state: &mut self.rng_state };
        eval(expr, &mut ctx)
    }
}

fn render_print_value(v: &Value, using: Option<&Value>) -> String {
    match v {
        Value::Str(s) => s.clone(),
        Value::Number(n) => match using {
            Some(Value::Str(pattern)) => apply_using(pattern, *n),
            _ => format_number(*n),
        },
    }
}

/// A simplified `USING` formatter: counts leading `#` placeholders (plus
/// one optional `.` for a decimal point) and pads/truncates to that width.
fn apply_using(pattern: &str, n: f64) -> String {
    let int_digits = pattern.chars().take_while(|c| *c == '#').count();
    if let Some(dot) = pattern.find('.') {
        let frac_digits = pattern[dot + 1..].chars().take_while(|c| *c == '#').count();
        format!("{n:int_digits$.frac_digits$}")
    } else if int_digits > 0 {
        format!("{:int_digits$}", n as i64)
    } else {
        format_number(n)
    }
}

fn lvalue_name(v: &LValue) -> String {
    match v {
        LValue::Scalar(n) | LValue::ArrayElem(n, _) => n.clone(),
    }
}

fn split_line_number(src: &str) -> Option<(u32, &str)> {
    let digits: String = src.chars().take_while(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    let n = digits.parse().ok()?;
    Some((n, src[digits.len()..].trim_start()))
}

fn split_outside_quotes(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        if c == '"' {
            in_quotes = !in_quotes;
        } else if c == sep && !in_quotes {
            parts.push(&s[start..i]);
            start = i + c.len_utf8();
        }
    }
    parts.push(&s[start..]);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::NullAdapter;

    fn rt() -> Runtime<NullAdapter> {
        Runtime::new(NullAdapter)
    }

    #[test]
    fn immediate_let_and_print() {
        let mut r = rt();
        r.submit_line("LET A=(2+3)*4");
        r.submit_line("PRINT A");
        let out = String::from_utf8(r.take_output()).unwrap();
        assert!(out.contains("20"));
    }

    #[test]
    fn sample_program_runs_to_completion() {
        let mut r = rt();
        for line in [
            "10 A=1",
            "20 PRINT A",
            "30 A=A+1",
            "40 WAIT 0",
            "50 IF A>10 THEN 70",
            "60 GOTO 20",
            "70 PRINT \"owari\"",
            "80 END",
        ] {
            r.submit_line(line);
        }
        r.submit_line("RUN");
        let mut now = 0u64;
        for _ in 0..2000 {
            r.pump(now);
            now += 1;
            if !r.is_running() && !r.is_suspended() {
                break;
            }
        }
        let out = String::from_utf8(r.take_output()).unwrap();
        assert!(out.contains("owari"));
        assert!(!r.is_running());
    }

    #[test]
    fn wait_suspends_relative_to_a_real_wall_clock() {
        let mut r = rt();
        for line in ["10 A=1", "20 WAIT 64", "30 A=2", "40 END"] {
            r.submit_line(line);
        }
        r.submit_line("RUN");

        let start = 1_000_000u64;
        r.pump(start);
        assert!(r.is_suspended(), "WAIT must suspend even when now_ms is far from zero");

        r.pump(start + 10);
        assert!(r.is_suspended(), "must still be waiting before the 64ms delay elapses");

        r.pump(start + 64);
        assert!(!r.is_running());
    }

    #[test]
    fn stop_then_cont_resumes() {
        let mut r = rt();
        r.submit_line("10 PRINT 1");
        r.submit_line("20 STOP");
        r.submit_line("30 PRINT 2");
        r.submit_line("RUN");
        r.pump(0);
        assert!(r.is_suspended());
        r.cont();
        r.pump(0);
        let out = String::from_utf8(r.take_output()).unwrap();
        assert!(out.contains('2'));
    }

    #[test]
    fn no_line_error_mapping() {
        let mut r = rt();
        r.submit_line("GOTO 999");
        let out = String::from_utf8(r.take_output()).unwrap();
        assert!(out.contains("NO LINE 999 (E06)"));
    }

    #[test]
    fn swap_adapter_preserves_program_and_variables() {
        let mut r = rt();
        r.submit_line("10 PRINT \"HI\"");
        r.submit_line("LET A=7");

        let (r, _old) = r.swap_adapter(NullAdapter);
        let mut r = r;
        assert_eq!(r.vars.get_scalar("A"), crate::ast::Value::Number(7.0));
        r.submit_line("PRINT A");
        let out = String::from_utf8(r.take_output()).unwrap();
        assert!(out.contains('7'));
    }
}
