mod asm;
mod expr;
mod macros;
mod scope;

use crate::error::Diagnostics;
use crate::token::{Line, Token, TokenKind};
use asm::{AsmBuilder, Cc, MemSize, MemSized, Operand, Reg};
use expr::Eval;
use scope::{is_boolean_type, is_unsigned_type, type_size, Function, FunctionTable, ScopeStack};

/// The declared type family driving which assignment lowerings are tried.
/// FloatingPoint is recognized but has no lowering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AssignKind {
    Integer,
    FloatingPoint,
    Boolean,
    Unspecified,
}

pub struct Compiled {
    pub asm: String,
    pub diagnostics: Diagnostics,
}

/// Statement classification, decided from the leading tokens alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Statement {
    Macro,
    Scope,
    FunctionCall,
    VariableChange,
    FunctionDeclaration,
    Return,
    VariableDeclaration,
    Unrecognized,
}

fn classify(tokens: &[Token]) -> Statement {
    let Some(first) = tokens.first() else {
        return Statement::Unrecognized;
    };
    match first.kind {
        TokenKind::Macro => Statement::Macro,
        TokenKind::Scope => Statement::Scope,
        TokenKind::Identifier => {
            if tokens.get(1).is_some_and(|t| t.is("(")) {
                Statement::FunctionCall
            } else {
                Statement::VariableChange
            }
        }
        TokenKind::Keyword if first.is("define") => Statement::FunctionDeclaration,
        TokenKind::Keyword if first.is("return") => Statement::Return,
        TokenKind::Keyword if tokens.len() > 3 && tokens[3].kind == TokenKind::TypeName => {
            Statement::VariableDeclaration
        }
        _ => Statement::Unrecognized,
    }
}

/// Single-pass code generator. One instance per compilation; all mutable
/// state lives here for the duration of one `compile` call.
pub struct Compiler {
    out: AsmBuilder,
    diags: Diagnostics,
    scope: ScopeStack,
    functions: FunctionTable,
    current_function: Option<usize>,
    function_scopes: u32,
    current_line: u32,
    labels: u32,
    has_exit: bool,
}

impl Compiler {
    pub fn new() -> Self {
        Self {
            out: AsmBuilder::new(),
            diags: Diagnostics::new(),
            scope: ScopeStack::new(),
            functions: FunctionTable::new(),
            current_function: None,
            function_scopes: 0,
            current_line: 0,
            labels: 0,
            has_exit: false,
        }
    }

    /// Walks the tokenized lines in order and emits the assembly text.
    /// Diagnostics are collected, never fatal; the output is always a
    /// complete (if best-effort) assembly file.
    pub fn compile(mut self, lines: &[Line]) -> Compiled {
        asm::code!(self.out, "section .data");
        asm::code!(self.out, "section .bss");
        asm::code!(self.out, "section .text");
        asm::code!(self.out, " global _start");

        for line in lines {
            self.dispatch(line);
        }

        if !self.has_exit {
            self.diags
                .completeness("Your program has to use the exit! macro at the end of the program");
        }

        Compiled {
            asm: self.out.into_inner(),
            diagnostics: self.diags,
        }
    }

    /// Routes one classified statement to its handler.
    pub(crate) fn dispatch(&mut self, tokens: &[Token]) {
        let Some(first) = tokens.first() else { return };
        self.current_line = first.line;
        let last = &tokens[tokens.len() - 1];

        match classify(tokens) {
            Statement::Macro => {
                self.check_semicolon(last);
                macros::handle(self, tokens);
            }
            Statement::Scope => self.handle_scope(tokens),
            Statement::FunctionCall => {
                self.check_semicolon(last);
                self.function_call(tokens);
            }
            Statement::VariableChange => {
                self.check_semicolon(last);
                self.variable_change(tokens);
            }
            Statement::FunctionDeclaration => self.function_declaration(tokens),
            Statement::Return => {
                self.check_semicolon(last);
                self.return_statement(tokens);
            }
            Statement::VariableDeclaration => {
                self.check_semicolon(last);
                self.variable_declaration(tokens);
            }
            Statement::Unrecognized => {}
        }
    }

    fn check_semicolon(&mut self, token: &Token) -> bool {
        if token.kind != TokenKind::Semicolon {
            let message = format!(
                "Expected a semicolon, but got {} -> '{}'",
                token.kind, token.text
            );
            self.diags.syntax(self.current_line, message);
            return false;
        }
        true
    }

    fn assign_kind(type_name: &str) -> AssignKind {
        if type_name == "float" {
            AssignKind::FloatingPoint
        } else if is_boolean_type(type_name) {
            AssignKind::Boolean
        } else {
            AssignKind::Integer
        }
    }

    // `{` opens a frame (and binds parameters at a function's outermost
    // brace); `}` tears it down and closes the function when the last
    // brace falls shut. Main never gets a `ret`; its return is the exit
    // syscall.
    fn handle_scope(&mut self, tokens: &[Token]) {
        if tokens[0].is("{") {
            asm::code!(self.out, Push, Reg::Rbp);
            asm::code!(self.out, Mov, Reg::Rbp, Reg::Rsp);
            self.scope.enter();

            if let Some(index) = self.current_function {
                if self.function_scopes == 0 {
                    self.bind_parameters(index);
                }
            }
            self.function_scopes += 1;
        } else {
            asm::code!(self.out, Mov, Reg::Rsp, Reg::Rbp);
            asm::code!(self.out, Pop, Reg::Rbp);
            self.scope.leave();

            if self.function_scopes > 0 {
                self.function_scopes -= 1;
                if self.function_scopes == 0 {
                    if let Some(index) = self.current_function {
                        if self.functions.get(index).name != "main" {
                            asm::code!(self.out, Ret);
                        }
                    }
                    self.current_function = None;
                }
            }
        }
    }

    // Stores each argument register into its precomputed frame slot and
    // declares the parameters into the just-opened frame, once per function.
    fn bind_parameters(&mut self, index: usize) {
        let params = self.functions.get(index).params.clone();

        let total: u32 = params.iter().map(|p| p.size).sum();
        if total > 0 {
            asm::code!(self.out, Sub, Reg::Rsp, total);
        }

        for (num, var) in params.into_iter().enumerate() {
            match Reg::param(num, var.mem_size()) {
                Some(reg) => {
                    asm::code!(self.out, Mov, var.mem(), reg);
                    self.scope.adopt(var);
                }
                None => self.diags.warning(
                    self.current_line,
                    "Unsupported parameter number -> functions only support 6 parameters... \
                     Other parameters will be ignored!",
                ),
            }
        }
    }

    // Mutation statements: `x++;` / `x--;`, `x = expr;` and the raw-store
    // referral form `x : 5;`.
    fn variable_change(&mut self, tokens: &[Token]) {
        if tokens.len() < 2 {
            let message = format!("Expected an (assignment) operator after '{}'", tokens[0].text);
            self.diags.syntax(self.current_line, message);
            return;
        }

        match tokens[1].kind {
            TokenKind::Operator => {
                let Some(var) = self.scope.lookup(&tokens[0].text).cloned() else {
                    self.unresolved_variable(&tokens[0].text);
                    return;
                };
                let reg = Reg::acc(var.mem_size());
                asm::code!(self.out, Mov, reg, var.mem());
                if tokens[1].is("++") {
                    asm::code!(self.out, Inc, reg);
                } else if tokens[1].is("--") {
                    asm::code!(self.out, Dec, reg);
                }
                asm::code!(self.out, Mov, var.mem(), reg);
            }
            TokenKind::Assignment => {
                let Some(var) = self.scope.lookup(&tokens[0].text).cloned() else {
                    self.unresolved_variable(&tokens[0].text);
                    return;
                };
                let span = &tokens[2..tokens.len().saturating_sub(1).max(2)];
                self.assign(
                    span,
                    Operand::Mem(var.mem()),
                    var.mem_size(),
                    Self::assign_kind(&var.type_name),
                );
            }
            TokenKind::Referral => {
                let Some(var) = self.scope.lookup(&tokens[0].text).cloned() else {
                    self.unresolved_variable(&tokens[0].text);
                    return;
                };
                let Some(value) = tokens.get(2).filter(|t| t.kind == TokenKind::Numeric) else {
                    let got = tokens.get(2).map(|t| (t.kind, t.text.as_str()));
                    let (kind, text) = got.unwrap_or((TokenKind::Unknown, ""));
                    let message =
                        format!("Expected a numeric literal (number), but got {kind} -> '{text}'");
                    self.diags.syntax(self.current_line, message);
                    return;
                };
                let reg = Reg::acc(var.mem_size());
                asm::code!(self.out, Mov, reg, &value.text);
                asm::code!(self.out, Mov, var.mem(), reg);
            }
            _ => {
                let message = format!(
                    "Expected an (assignment) operator, but got {} -> '{}'",
                    tokens[1].kind, tokens[1].text
                );
                self.diags.syntax(self.current_line, message);
            }
        }
    }

    fn unresolved_variable(&mut self, name: &str) {
        let message = format!("There is no variable available called '{name}'");
        self.diags.unresolved(self.current_line, message);
    }

    // `local name : type = expr;` or `local name : type [];`. The variable
    // is registered before its initializer is compiled. Array bodies are
    // recognized but not lowered. `global` passes the shape checks and
    // emits nothing.
    fn variable_declaration(&mut self, tokens: &[Token]) {
        let mut array = false;
        if tokens[1].kind != TokenKind::Identifier {
            let message = format!(
                "Expected a variable name, but got {} -> '{}'",
                tokens[1].kind, tokens[1].text
            );
            self.diags.syntax(self.current_line, message);
        }
        if tokens[2].kind != TokenKind::Referral {
            let message = format!(
                "Expected a referral like ':', but got {} -> '{}'",
                tokens[2].kind, tokens[2].text
            );
            self.diags.syntax(self.current_line, message);
        }
        match tokens.get(4) {
            Some(t) if t.kind == TokenKind::IndexBracket => {
                if tokens.get(5).is_some_and(|t| t.kind == TokenKind::IndexBracket) {
                    array = true;
                } else {
                    let message = String::from("Expected square brackets to declare an array");
                    self.diags.syntax(self.current_line, message);
                }
            }
            Some(t) if t.kind != TokenKind::Assignment => {
                let message = format!(
                    "Expected an assignment operator, but got {} -> '{}'",
                    t.kind, t.text
                );
                self.diags.syntax(self.current_line, message);
            }
            _ => {}
        }

        if !tokens[0].is("local") {
            return;
        }

        let type_name = tokens[3].text.clone();
        if is_unsigned_type(&type_name)
            && tokens.get(5).is_some_and(|t| t.text.starts_with('-'))
        {
            let message = "Unsigned variables cannot be constructed negative";
            self.diags.semantic(self.current_line, message);
            return;
        }

        let size = type_size(&type_name);
        let Some(var) = self
            .scope
            .declare(&tokens[1].text, &type_name, size, false, array)
        else {
            let message = "You cannot declare variables outside of a scope";
            self.diags.semantic(self.current_line, message);
            return;
        };

        if var.array {
            // recognized syntactically; array bodies have no lowering
            return;
        }

        asm::code!(self.out, Sub, Reg::Rsp, size);
        let span = if tokens.len() >= 6 {
            &tokens[5..tokens.len() - 1]
        } else {
            &[]
        };
        self.assign(
            span,
            Operand::Mem(var.mem()),
            var.mem_size(),
            Self::assign_kind(&type_name),
        );
    }

    // `define main()` binds the program entry; everything else is
    // `define name(p : type, ...) -> type`, with frame offsets assigned in
    // declaration order.
    fn function_declaration(&mut self, tokens: &[Token]) {
        let Some(name) = tokens.get(1) else {
            let message = String::from("Expected a function name after 'define'");
            self.diags.syntax(self.current_line, message);
            return;
        };

        if name.is("main") {
            if !tokens.get(2).is_some_and(|t| t.is("(")) {
                let message = String::from("Expected an open parenthesis '(' after 'main'");
                self.diags.syntax(self.current_line, message);
            }
            if !tokens.get(3).is_some_and(|t| t.is(")")) {
                let message = String::from("Expected a closed parenthesis ')' after 'main('");
                self.diags.syntax(self.current_line, message);
            }

            asm::code!(self.out, "_start:");

            let index = self.functions.register(Function {
                name: String::from("main"),
                return_size: 8,
                params: Vec::new(),
                return_type: String::from("void"),
            });
            self.current_function = Some(index);
            self.function_scopes = 0;
            return;
        }

        if tokens.len() < 6 {
            let message = String::from("A function needs a parameter list and a return type");
            self.diags.syntax(self.current_line, message);
            return;
        }
        if name.kind != TokenKind::Identifier {
            let message = format!(
                "Expected a function name, but got {} -> '{}'",
                name.kind, name.text
            );
            self.diags.syntax(self.current_line, message);
        }
        if !tokens[2].is("(") {
            let message = format!(
                "Expected an open parenthesis '(', but got {} -> '{}'",
                tokens[2].kind, tokens[2].text
            );
            self.diags.syntax(self.current_line, message);
        }
        let closed = &tokens[tokens.len() - 3];
        if !closed.is(")") {
            let message = format!(
                "Expected a closed parenthesis ')', but got {} -> '{}'",
                closed.kind, closed.text
            );
            self.diags.syntax(self.current_line, message);
        }
        let arrow = &tokens[tokens.len() - 2];
        if !arrow.is("->") {
            let message = format!(
                "Expected the arrow operator '->', but got {} -> '{}'",
                arrow.kind, arrow.text
            );
            self.diags.syntax(self.current_line, message);
        }
        let return_token = &tokens[tokens.len() - 1];
        if return_token.kind != TokenKind::TypeName {
            let message = format!(
                "Expected a variable type for the return value, but got {} -> '{}'",
                return_token.kind, return_token.text
            );
            self.diags.syntax(self.current_line, message);
        }

        let mut params = Vec::new();
        let mut stack = 0u32;
        let mut i = 3;
        while i < tokens.len() - 3 {
            if tokens[i].is(",") {
                i += 1;
                continue;
            }

            let mut malformed = false;
            if tokens[i].kind != TokenKind::Identifier {
                let message = format!(
                    "Expected a variable name, but got {} -> '{}'",
                    tokens[i].kind, tokens[i].text
                );
                self.diags.syntax(self.current_line, message);
                malformed = true;
            }
            if !tokens.get(i + 1).is_some_and(|t| t.kind == TokenKind::Referral) {
                let message = String::from("Expected a referral in the parameter list");
                self.diags.syntax(self.current_line, message);
                malformed = true;
            }
            if !tokens.get(i + 2).is_some_and(|t| t.kind == TokenKind::TypeName) {
                let message = String::from("Expected a variable type in the parameter list");
                self.diags.syntax(self.current_line, message);
                malformed = true;
            }
            if tokens.get(i + 3).is_some_and(|t| t.kind == TokenKind::Identifier) {
                let message = String::from("Expected a comma ',' in the parameter list");
                self.diags.syntax(self.current_line, message);
                malformed = true;
            }
            if malformed {
                i += 1;
                continue;
            }

            let type_name = tokens[i + 2].text.clone();
            let size = type_size(&type_name);
            stack += size;
            params.push(scope::Variable {
                name: tokens[i].text.clone(),
                offset: stack,
                size,
                unsigned: is_unsigned_type(&type_name),
                mutable: true,
                boolean: is_boolean_type(&type_name),
                array: false,
                type_name,
            });
            i += 4;
        }

        asm::code!(self.out, "{}:", name.text);

        let index = self.functions.register(Function {
            name: name.text.clone(),
            return_size: type_size(&return_token.text),
            params,
            return_type: return_token.text.clone(),
        });
        self.current_function = Some(index);
        self.function_scopes = 0;
    }

    // Compiles each argument span into its positional parameter register
    // and emits the call. Returns the callee's result size (0 for void) so
    // assignment contexts know whether the return register holds a value.
    pub(crate) fn function_call(&mut self, tokens: &[Token]) -> u32 {
        let Some(function) = self.functions.lookup(&tokens[0].text).cloned() else {
            let message = format!(
                "There is no method/function available called '{}'",
                tokens[0].text
            );
            self.diags.unresolved(self.current_line, message);
            return 0;
        };

        let closed = if tokens.last().is_some_and(|t| t.kind == TokenKind::Semicolon) {
            tokens.len().saturating_sub(2)
        } else {
            tokens.len().saturating_sub(1)
        };
        if !tokens.get(1).is_some_and(|t| t.is("(")) {
            let message = String::from("Expected an open parenthesis '(' after the function name");
            self.diags.syntax(self.current_line, message);
        }
        if !tokens.get(closed).is_some_and(|t| t.is(")")) {
            let message = String::from("Expected a closed parenthesis ')' after the arguments");
            self.diags.syntax(self.current_line, message);
        }

        let mut index = 2;
        for (num, param) in function.params.iter().enumerate() {
            let mut span = Vec::new();
            while index < closed && !tokens[index].is(",") && !tokens[index].is(")") {
                span.push(tokens[index].clone());
                index += 1;
            }
            if index < closed {
                index += 1;
            }
            if span.is_empty() {
                continue;
            }

            match Reg::param(num, param.mem_size()) {
                Some(reg) => {
                    self.assign(
                        &span,
                        Operand::Reg(reg),
                        param.mem_size(),
                        Self::assign_kind(&param.type_name),
                    );
                }
                None => self.diags.warning(
                    self.current_line,
                    "Unsupported parameter number -> functions only support 6 parameters... \
                     Other parameters will be ignored!",
                ),
            }
        }

        asm::code!(self.out, Call, &function.name);
        function.return_size
    }

    // `return` in main exits the process; elsewhere it tears the frame down
    // and returns, with the value staged in the size-correct accumulator.
    fn return_statement(&mut self, tokens: &[Token]) {
        let Some(index) = self.current_function else {
            let message = "You cannot return outside of functions";
            self.diags.semantic(self.current_line, message);
            return;
        };
        let function = self.functions.get(index).clone();

        if function.name == "main" {
            if tokens.len() <= 2 {
                asm::code!(self.out, Mov, Reg::Rax, 60);
                asm::code!(self.out, Mov, Reg::Rdi, 0);
                asm::code!(self.out, Syscall);
            } else {
                let span = &tokens[1..tokens.len() - 1];
                self.assign(span, Operand::Reg(Reg::Rcx), MemSize::QWord, AssignKind::Integer);
                asm::code!(self.out, Mov, Reg::Rax, 60);
                asm::code!(self.out, Mov, Reg::Rdi, Reg::Rcx);
                asm::code!(self.out, Syscall);
            }
            return;
        }

        if tokens.len() <= 2 {
            asm::code!(self.out, Mov, Reg::Rsp, Reg::Rbp);
            asm::code!(self.out, Pop, Reg::Rbp);
            asm::code!(self.out, Ret);
        } else if function.return_size == 0 {
            let message = "You cannot return, if your return type is 'void'";
            self.diags.semantic(self.current_line, message);
        } else {
            let size = MemSize::try_from(function.return_size).unwrap_or(MemSize::Byte);
            let span = &tokens[1..tokens.len() - 1];
            self.assign(
                span,
                Operand::Reg(Reg::acc(size)),
                size,
                Self::assign_kind(&function.return_type),
            );
            asm::code!(self.out, Mov, Reg::Rsp, Reg::Rbp);
            asm::code!(self.out, Pop, Reg::Rbp);
            asm::code!(self.out, Ret);
        }
    }

    /// Lowers an expression token span into `dest`. Which paths are tried
    /// depends on the declared type family of the destination.
    pub(crate) fn assign(
        &mut self,
        tokens: &[Token],
        dest: Operand,
        size: MemSize,
        kind: AssignKind,
    ) -> bool {
        if matches!(kind, AssignKind::Integer | AssignKind::Unspecified) {
            if tokens.len() == 1 {
                match tokens[0].kind {
                    TokenKind::Numeric => {
                        let Ok(value) = tokens[0].text.parse::<i64>() else {
                            let message =
                                format!("The literal '{}' is not a valid number", tokens[0].text);
                            self.diags.syntax(self.current_line, message);
                            return false;
                        };
                        asm::code!(self.out, Mov, dest, value);
                        return true;
                    }
                    TokenKind::Identifier => {
                        let Some(var) = self.scope.lookup(&tokens[0].text).cloned() else {
                            self.unresolved_variable(&tokens[0].text);
                            return false;
                        };
                        self.load_variable(&var, size);
                        let acc = Reg::acc(size);
                        if dest != Operand::Reg(acc) {
                            asm::code!(self.out, Mov, dest, acc);
                        }
                        return true;
                    }
                    _ => {}
                }
            } else if tokens.len() >= 4 && tokens.iter().any(|t| t.is("?")) {
                return self.assign_ternary(tokens, dest, size);
            } else if tokens.len() > 1 {
                match expr::evaluate(self, tokens, size) {
                    Eval::Done(reg) => {
                        if dest != Operand::Reg(reg) {
                            asm::code!(self.out, Mov, dest, reg);
                        }
                        return true;
                    }
                    Eval::NotArithmetic => {
                        let result_size = self.function_call(tokens);
                        if result_size != 0 {
                            let rsize =
                                MemSize::try_from(result_size).unwrap_or(MemSize::Byte);
                            self.move_converted(dest, Reg::acc(rsize), size);
                            return true;
                        }
                    }
                    Eval::Failed => return false,
                }
            }
        }

        if matches!(kind, AssignKind::Boolean | AssignKind::Unspecified) {
            return self.assign_boolean(tokens, dest, size);
        }

        false
    }

    // Branch-free conditional: compare, save flags, compile both arms,
    // restore flags, conditionally move the if-arm over the else-arm.
    // cmov has no byte form, so the select runs at 4 bytes minimum.
    fn assign_ternary(&mut self, tokens: &[Token], dest: Operand, size: MemSize) -> bool {
        let mut stage = 0;
        let mut condition: Option<Token> = None;
        let mut left = Vec::new();
        let mut right = Vec::new();
        let mut if_value = Vec::new();
        let mut else_value = Vec::new();

        for token in tokens {
            if token.kind == TokenKind::Comparison || token.kind == TokenKind::Referral {
                if token.is("?") && !left.is_empty() && right.is_empty() {
                    // bare condition, jump straight to the value arms
                    stage = 2;
                    continue;
                }
                if token.kind == TokenKind::Comparison && !token.is("?") {
                    condition = Some(token.clone());
                }
                stage += 1;
                continue;
            }

            match stage {
                0 => left.push(token.clone()),
                1 => right.push(token.clone()),
                2 => if_value.push(token.clone()),
                _ => else_value.push(token.clone()),
            }
        }

        if condition.is_none() && right.is_empty() && left.len() == 1 {
            let Some(var) = self.scope.lookup(&left[0].text) else {
                self.unresolved_variable(&left[0].text);
                return false;
            };
            if var.boolean {
                right.push(Token::new(TokenKind::Keyword, "true", left[0].line));
                condition = Some(Token::new(TokenKind::Comparison, "==", left[0].line));
            }
        }
        let Some(condition) = condition else {
            let message = "The conditional expression is missing its comparison";
            self.diags.syntax(self.current_line, message);
            return false;
        };

        let wide = if (size as u32) < 4 { MemSize::DWord } else { size };
        let cc = Cc::from_comparison(&condition.text).unwrap_or(Cc::E);

        self.compare(&left, &right);
        asm::code!(self.out, Pushf);
        self.assign(
            &if_value,
            Operand::Reg(Reg::bse(wide)),
            wide,
            AssignKind::Unspecified,
        );
        self.assign(
            &else_value,
            Operand::Reg(Reg::acc(wide)),
            wide,
            AssignKind::Unspecified,
        );
        asm::code!(self.out, Popf);
        asm::code!(self.out, "  cmov{cc} {}, {}", Reg::acc(wide), Reg::bse(wide));

        asm::code!(self.out, Mov, dest, Reg::acc(size));
        true
    }

    // true/false literals, boolean identifiers, and comparison lowerings
    // (`cmp` + `set<cc> al` + widening store).
    fn assign_boolean(&mut self, tokens: &[Token], dest: Operand, size: MemSize) -> bool {
        if tokens.len() == 1 {
            let token = &tokens[0];
            return match token.kind {
                TokenKind::Keyword if token.is("true") => {
                    asm::code!(self.out, Mov, dest, 1);
                    true
                }
                TokenKind::Keyword if token.is("false") => {
                    asm::code!(self.out, Mov, dest, 0);
                    true
                }
                TokenKind::Identifier => {
                    let Some(var) = self.scope.lookup(&token.text).cloned() else {
                        self.unresolved_variable(&token.text);
                        return false;
                    };
                    if !var.boolean {
                        let message =
                            "You cannot assign non boolean type variables to boolean type variables";
                        self.diags.semantic(self.current_line, message);
                        return false;
                    }
                    let acc = Reg::acc(size);
                    asm::code!(self.out, Mov, acc, var.mem().with_size(size));
                    if dest != Operand::Reg(acc) {
                        asm::code!(self.out, Mov, dest, acc);
                    }
                    true
                }
                _ => {
                    let message =
                        "You can only use the keywords 'true' and 'false' to assign booleans";
                    self.diags.semantic(self.current_line, message);
                    false
                }
            };
        }
        if tokens.is_empty() {
            return false;
        }

        let mut condition: Option<Token> = None;
        let mut left = Vec::new();
        let mut right = Vec::new();
        let mut side = 0;
        for token in tokens {
            if token.kind == TokenKind::Comparison {
                condition = Some(token.clone());
                side += 1;
                continue;
            }
            if side == 0 {
                left.push(token.clone());
            } else {
                right.push(token.clone());
            }
        }

        if condition.is_none() && right.is_empty() && left.len() == 1 {
            let Some(var) = self.scope.lookup(&left[0].text) else {
                self.unresolved_variable(&left[0].text);
                return false;
            };
            if var.boolean {
                right.push(Token::new(TokenKind::Keyword, "true", left[0].line));
                condition = Some(Token::new(TokenKind::Comparison, "==", left[0].line));
            }
        }
        let Some(condition) = condition else {
            let message = "You cannot define booleans like you did! You have to use a condition";
            self.diags.semantic(self.current_line, message);
            return false;
        };

        let cc = Cc::from_comparison(&condition.text).unwrap_or(Cc::E);
        self.compare(&left, &right);
        asm::code!(self.out, "  set{cc} {}", Reg::Al);
        self.move_converted(dest, Reg::Al, size);
        true
    }

    // Both comparison sides are staged in the grade-3/grade-4 registers at
    // full width before the flag-setting compare.
    fn compare(&mut self, left: &[Token], right: &[Token]) {
        self.assign(
            left,
            Operand::Reg(Reg::Rcx),
            MemSize::QWord,
            AssignKind::Unspecified,
        );
        self.assign(
            right,
            Operand::Reg(Reg::Rdx),
            MemSize::QWord,
            AssignKind::Unspecified,
        );
        asm::code!(self.out, Cmp, Reg::Rcx, Reg::Rdx);
    }

    // Loads a variable into the accumulator for `size`, widening through
    // movzx when the source is narrower and at most two bytes. Wider or
    // narrower sources are read at their own width instead.
    fn load_variable(&mut self, var: &scope::Variable, size: MemSize) {
        let acc = Reg::acc(size);
        let var_size = var.mem_size();
        if (var_size as u32) < (size as u32) && (var_size as u32) <= 2 {
            asm::code!(self.out, Movzx, acc, var.mem());
        } else if var_size != size {
            asm::code!(self.out, Mov, acc.with_size(var_size), var.mem());
        } else {
            asm::code!(self.out, Mov, acc, var.mem());
        }
    }

    // Moves a register into `dest`, converting widths: small sources widen
    // with movzx (through the accumulator when the target is memory),
    // otherwise the transfer happens at the source width.
    fn move_converted(&mut self, dest: Operand, src: Reg, dest_size: MemSize) {
        let src_size = src.mem_size();

        if src_size == dest_size {
            if dest != Operand::Reg(src) {
                asm::code!(self.out, Mov, dest, src);
            }
        } else if (src_size as u32) < (dest_size as u32) && (src_size as u32) <= 2 {
            match dest {
                Operand::Reg(reg) => asm::code!(self.out, Movzx, reg, src),
                Operand::Mem(mem) => {
                    let acc = Reg::acc(dest_size);
                    asm::code!(self.out, Movzx, acc, src);
                    asm::code!(self.out, Mov, mem.with_size(dest_size), acc);
                }
                Operand::Imm(_) => {}
            }
        } else {
            match dest {
                Operand::Reg(reg) => {
                    let reg = reg.with_size(src_size);
                    if reg != src {
                        asm::code!(self.out, Mov, reg, src);
                    }
                }
                Operand::Mem(mem) => {
                    asm::code!(self.out, Mov, mem.with_size(src_size), src);
                }
                Operand::Imm(_) => {}
            }
        }
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DiagnosticKind;
    use crate::lexer::Lexer;

    fn compile(source: &str) -> Compiled {
        let lines = Lexer::new(source).collect();
        Compiler::new().compile(&lines)
    }

    fn classify_line(source: &str) -> Statement {
        let lines = Lexer::new(source).collect();
        classify(&lines[0])
    }

    #[test]
    fn statement_classification() {
        assert_eq!(classify_line("exit!(0);"), Statement::Macro);
        assert_eq!(classify_line("{"), Statement::Scope);
        assert_eq!(classify_line("f(1, 2);"), Statement::FunctionCall);
        assert_eq!(classify_line("x = 5;"), Statement::VariableChange);
        assert_eq!(classify_line("x++;"), Statement::VariableChange);
        assert_eq!(classify_line("define main()"), Statement::FunctionDeclaration);
        assert_eq!(classify_line("return 5;"), Statement::Return);
        assert_eq!(
            classify_line("local x : int32 = 5;"),
            Statement::VariableDeclaration
        );
        assert_eq!(classify_line("true;"), Statement::Unrecognized);
    }

    #[test]
    fn minimal_program_with_exit() {
        let out = compile(
            "define main()\n\
             {\n\
                 local x : int32 = 2;\n\
                 exit!(x);\n\
             }\n",
        );
        assert!(out.asm.contains("_start:"));
        assert!(out.asm.contains("mov dword [rbp-4], 2"));
        assert!(out.asm.contains("mov rax, 60"));
        assert!(out.asm.contains("mov rdi, rcx"));
        assert!(out.asm.contains("syscall"));
        assert_eq!(
            out.diagnostics.of_kind(DiagnosticKind::Completeness).count(),
            0,
            "a program with exit! must not draw the completeness warning"
        );
    }

    #[test]
    fn missing_exit_warns_exactly_once() {
        let out = compile(
            "define main()\n\
             {\n\
                 local x : int32 = 1;\n\
                 local y : int32 = 2;\n\
                 x = x + y;\n\
             }\n",
        );
        assert_eq!(
            out.diagnostics.of_kind(DiagnosticKind::Completeness).count(),
            1
        );
    }

    #[test]
    fn preamble_is_always_present() {
        let out = compile("");
        assert!(out.asm.starts_with(
            "section .data\nsection .bss\nsection .text\n global _start\n"
        ));
    }

    #[test]
    fn scope_braces_emit_frame_setup_and_teardown() {
        let out = compile("define main()\n{\n}\n");
        assert!(out.asm.contains("push rbp"));
        assert!(out.asm.contains("mov rbp, rsp"));
        assert!(out.asm.contains("mov rsp, rbp"));
        assert!(out.asm.contains("pop rbp"));
        // main never returns with ret; its exit is the syscall
        assert!(!out.asm.contains("ret"));
    }

    #[test]
    fn arithmetic_initializer() {
        let out = compile(
            "define main()\n\
             {\n\
                 local a : int32 = 3;\n\
                 local b : int32 = a + 4 * 2;\n\
                 exit!(b);\n\
             }\n",
        );
        assert!(out.asm.contains("imul eax, ebx"));
        assert!(out.asm.contains("add eax, ebx"));
        assert!(out.asm.contains("mov dword [rbp-8], eax"));
    }

    #[test]
    fn increment_and_decrement() {
        let out = compile(
            "define main()\n\
             {\n\
                 local n : int32 = 0;\n\
                 n++;\n\
                 n--;\n\
                 exit!(n);\n\
             }\n",
        );
        assert!(out.asm.contains("inc eax"));
        assert!(out.asm.contains("dec eax"));
    }

    #[test]
    fn referral_raw_store() {
        let out = compile(
            "define main()\n\
             {\n\
                 local n : int32 = 0;\n\
                 n : 7;\n\
                 exit!(n);\n\
             }\n",
        );
        assert!(out.asm.contains("mov eax, 7"));
        assert!(out.asm.contains("mov dword [rbp-4], eax"));
    }

    #[test]
    fn referral_requires_a_numeric_literal() {
        let out = compile(
            "define main()\n\
             {\n\
                 local n : int32 = 0;\n\
                 n : true;\n\
                 exit!(n);\n\
             }\n",
        );
        assert!(out
            .diagnostics
            .of_kind(DiagnosticKind::SyntaxShape)
            .any(|d| d.message.contains("numeric literal")));
    }

    #[test]
    fn ternary_lowers_without_branches() {
        let out = compile(
            "define main()\n\
             {\n\
                 local x : int32 = 5;\n\
                 local y : int32 = x > 2 ? 10 : 20;\n\
                 exit!(y);\n\
             }\n",
        );
        assert!(out.asm.contains("pushf"));
        assert!(out.asm.contains("mov ebx, 10"));
        assert!(out.asm.contains("mov eax, 20"));
        assert!(out.asm.contains("popf"));
        assert!(out.asm.contains("cmovg eax, ebx"));
        assert!(!out.asm.contains("jmp"));
    }

    #[test]
    fn boolean_comparison_assignment() {
        let out = compile(
            "define main()\n\
             {\n\
                 local x : int32 = 5;\n\
                 local b : bool = x > 2;\n\
                 exit!(x);\n\
             }\n",
        );
        assert!(out.asm.contains("cmp rcx, rdx"));
        assert!(out.asm.contains("setg al"));
        assert!(out.asm.contains("mov byte [rbp-5], al"));
    }

    #[test]
    fn boolean_literal_assignment() {
        let out = compile(
            "define main()\n\
             {\n\
                 local b : bool = true;\n\
                 local c : bool = false;\n\
                 exit!(0);\n\
             }\n",
        );
        assert!(out.asm.contains("mov byte [rbp-1], 1"));
        assert!(out.asm.contains("mov byte [rbp-2], 0"));
    }

    #[test]
    fn non_boolean_to_boolean_is_rejected() {
        let out = compile(
            "define main()\n\
             {\n\
                 local x : int32 = 5;\n\
                 local b : bool = x;\n\
                 exit!(0);\n\
             }\n",
        );
        assert!(out
            .diagnostics
            .of_kind(DiagnosticKind::SemanticRule)
            .any(|d| d.message.contains("non boolean")));
    }

    #[test]
    fn unsigned_negative_initializer_is_rejected() {
        let out = compile(
            "define main()\n\
             {\n\
                 local u : uint32 = -5;\n\
                 exit!(0);\n\
             }\n",
        );
        assert!(out
            .diagnostics
            .of_kind(DiagnosticKind::SemanticRule)
            .any(|d| d.message.contains("Unsigned")));
        assert!(!out.asm.contains("-5"));
    }

    #[test]
    fn function_declaration_and_call() {
        let out = compile(
            "define add(a : int32, b : int32) -> int32\n\
             {\n\
                 return a + b;\n\
             }\n\
             define main()\n\
             {\n\
                 local r : int32 = add(1, 2);\n\
                 exit!(r);\n\
             }\n",
        );
        assert!(out.asm.contains("add:"));
        // parameters land in their frame slots from the argument registers
        assert!(out.asm.contains("mov dword [rbp-4], edi"));
        assert!(out.asm.contains("mov dword [rbp-8], esi"));
        // arguments are staged into the argument registers at the call site
        assert!(out.asm.contains("mov edi, 1"));
        assert!(out.asm.contains("mov esi, 2"));
        assert!(out.asm.contains("call add"));
        assert!(out.asm.contains("ret"));
        assert!(out.diagnostics.of_kind(DiagnosticKind::UnresolvedSymbol).count() == 0);
    }

    #[test]
    fn unknown_function_call_is_reported() {
        let out = compile(
            "define main()\n\
             {\n\
                 missing(1);\n\
                 exit!(0);\n\
             }\n",
        );
        assert!(out
            .diagnostics
            .of_kind(DiagnosticKind::UnresolvedSymbol)
            .any(|d| d.message.contains("missing")));
    }

    #[test]
    fn return_from_void_function_is_rejected() {
        let out = compile(
            "define nothing() -> void\n\
             {\n\
                 return 5;\n\
             }\n\
             define main()\n\
             {\n\
                 exit!(0);\n\
             }\n",
        );
        assert!(out
            .diagnostics
            .of_kind(DiagnosticKind::SemanticRule)
            .any(|d| d.message.contains("void")));
    }

    #[test]
    fn return_outside_function_is_rejected() {
        let out = compile("return 5;\n");
        assert!(out
            .diagnostics
            .of_kind(DiagnosticKind::SemanticRule)
            .any(|d| d.message.contains("outside of functions")));
    }

    #[test]
    fn bare_return_in_main_exits_with_zero() {
        let out = compile(
            "define main()\n\
             {\n\
                 return;\n\
             }\n",
        );
        assert!(out.asm.contains("mov rax, 60"));
        assert!(out.asm.contains("mov rdi, 0"));
    }

    #[test]
    fn outer_declaration_wins_over_inner() {
        // the scope stack searches outermost-first, so the outer int32
        // is found even after the inner int64 declaration
        let out = compile(
            "define main()\n\
             {\n\
                 local x : int32 = 1;\n\
                 {\n\
                     local x : int64 = 2;\n\
                     x = 3;\n\
                 }\n\
                 exit!(0);\n\
             }\n",
        );
        assert!(out.asm.contains("mov dword [rbp-4], 3"));
    }

    #[test]
    fn array_declaration_is_recognized_but_not_lowered() {
        let out = compile(
            "define main()\n\
             {\n\
                 local arr : int32 [];\n\
                 exit!(0);\n\
             }\n",
        );
        // no stack reservation for the array body
        assert!(!out.asm.contains("sub rsp, 4"));
        assert!(out.diagnostics.of_kind(DiagnosticKind::SyntaxShape).count() == 0);
    }

    #[test]
    fn clamp_enforces_min_then_max() {
        let out = compile(
            "define main()\n\
             {\n\
                 local x : int32 = 15;\n\
                 clamp!(x, 0, 10);\n\
                 exit!(x);\n\
             }\n",
        );
        let min_at = out.asm.find("cmovl eax, ebx").expect("min raise");
        let max_at = out.asm.find("cmovg eax, ebx").expect("max lower");
        assert!(min_at < max_at, "min is enforced before max");
        assert!(out.asm.contains("mov ecx, 0"));
        assert!(out.asm.contains("mov ecx, 10"));
        assert!(out.asm.contains("mov dword [rbp-4], eax"));
    }

    #[test]
    fn swap_same_size_variables() {
        let out = compile(
            "define main()\n\
             {\n\
                 local a : int32 = 1;\n\
                 local b : int32 = 2;\n\
                 swap!(a, b);\n\
                 exit!(a);\n\
             }\n",
        );
        assert!(out.asm.contains("xchg eax, ebx"));
        assert!(out.asm.contains("mov dword [rbp-4], eax"));
        assert!(out.asm.contains("mov dword [rbp-8], ebx"));
    }

    #[test]
    fn swap_rejects_different_sizes() {
        let out = compile(
            "define main()\n\
             {\n\
                 local a : int32 = 1;\n\
                 local b : int64 = 2;\n\
                 swap!(a, b);\n\
                 exit!(a);\n\
             }\n",
        );
        assert!(out
            .diagnostics
            .of_kind(DiagnosticKind::SemanticRule)
            .any(|d| d.message.contains("same type size")));
        assert!(!out.asm.contains("xchg"));
    }

    #[test]
    fn negate_signed_variable() {
        let out = compile(
            "define main()\n\
             {\n\
                 local x : int32 = 5;\n\
                 negate!(x, x);\n\
                 exit!(x);\n\
             }\n",
        );
        assert!(out.asm.contains("imul eax, -1"));
    }

    #[test]
    fn negate_byte_goes_through_a_word_stage() {
        let out = compile(
            "define main()\n\
             {\n\
                 local x : int8 = 5;\n\
                 negate!(x, x);\n\
                 exit!(0);\n\
             }\n",
        );
        assert!(out.asm.contains("movsx ax, al"));
        assert!(out.asm.contains("imul ax, -1"));
        assert!(out.asm.contains("mov byte [rbp-1], al"));
    }

    #[test]
    fn negate_rejects_unsigned() {
        let out = compile(
            "define main()\n\
             {\n\
                 local x : uint32 = 5;\n\
                 negate!(x, x);\n\
                 exit!(0);\n\
             }\n",
        );
        assert!(out
            .diagnostics
            .of_kind(DiagnosticKind::SemanticRule)
            .any(|d| d.message.contains("negate unsigned")));
        assert!(!out.asm.contains("imul"));
    }

    #[test]
    fn repeat_is_a_do_while_loop() {
        let out = compile(
            "define main()\n\
             {\n\
                 local n : int32 = 0;\n\
                 repeat!(3, { n++; });\n\
                 exit!(n);\n\
             }\n",
        );
        assert!(out.asm.contains("mov r8, 3"));
        let label_at = out.asm.find("REPEAT0:").expect("loop label");
        let body_at = out.asm.rfind("inc eax").expect("loop body");
        let dec_at = out.asm.find("dec r8").expect("counter decrement");
        let jnz_at = out.asm.find("jnz REPEAT0").expect("back edge");
        assert!(label_at < body_at, "label precedes the body");
        assert!(body_at < dec_at, "body runs before the counter test");
        assert!(dec_at < jnz_at);
    }

    #[test]
    fn repeat_labels_are_unique() {
        let out = compile(
            "define main()\n\
             {\n\
                 local n : int32 = 0;\n\
                 repeat!(2, { n++; });\n\
                 repeat!(2, { n--; });\n\
                 exit!(n);\n\
             }\n",
        );
        assert!(out.asm.contains("REPEAT0:"));
        assert!(out.asm.contains("REPEAT1:"));
    }

    #[test]
    fn exit_with_expression() {
        let out = compile(
            "define main()\n\
             {\n\
                 exit!(2 + 3);\n\
             }\n",
        );
        assert!(out.asm.contains("mov rax, 2"));
        assert!(out.asm.contains("mov rbx, 3"));
        assert!(out.asm.contains("add rax, rbx"));
        assert!(out.asm.contains("mov rcx, rax"));
        assert!(out.asm.contains("mov rdi, rcx"));
    }

    #[test]
    fn unknown_variable_reference_is_reported() {
        let out = compile(
            "define main()\n\
             {\n\
                 local x : int32 = ghost + 1;\n\
                 exit!(0);\n\
             }\n",
        );
        assert!(out
            .diagnostics
            .of_kind(DiagnosticKind::UnresolvedSymbol)
            .any(|d| d.message.contains("ghost")));
    }

    #[test]
    fn diagnostics_carry_source_line_numbers() {
        let out = compile(
            "define main()\n\
             {\n\
                 exit!(0)\n\
             }\n",
        );
        let missing = out
            .diagnostics
            .of_kind(DiagnosticKind::SyntaxShape)
            .find(|d| d.message.contains("semicolon"))
            .expect("missing semicolon diagnostic");
        assert_eq!(missing.line, 3);
    }
}
