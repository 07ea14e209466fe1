use std::io::Write;

use crate::{
    code_generator::{CodeGenerator, Command, Segment},
    compilation_engine::CompilationEngine,
    error::{CompileError, Result},
    sym_table::{Kind, Scopes, Symbol},
    tokenizer::MAX_INT,
    tokens::{Token, TokenStream},
};

const OPS: [char; 9] = ['+', '-', '*', '/', '&', '|', '<', '>', '='];

const ALLOC: &str = "Memory.alloc";
const STRING_NEW: &str = "String.new";
const STRING_APPEND: &str = "String.appendChar";
const MULTIPLY: &str = "Math.multiply";
const DIVIDE: &str = "Math.divide";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubroutineKind {
    Constructor,
    Function,
    Method,
}

/// A resolved `call` instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub name: String,
    pub n_args: u16,
}

/// What a term or expression left on the stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Constant,
    Variable(Kind),
    ArrayElement,
    Returned(Call),
    Unary(Command),
    Grouped,
    Binary,
}

pub struct VmCompilationEngine<W: Write> {
    code_gen: CodeGenerator<W>,
    tokens: TokenStream,
    class_name: String,
    sub_kind: SubroutineKind,
    scopes: Scopes,
}

impl<W: Write> VmCompilationEngine<W> {
    pub fn new(tokens: TokenStream, out: W) -> Self {
        VmCompilationEngine {
            code_gen: CodeGenerator::new(out),
            tokens,
            class_name: String::new(),
            sub_kind: SubroutineKind::Function,
            scopes: Scopes::new(),
        }
    }

    /// Starts inside `class_name`, for compiling single productions.
    #[cfg(test)]
    pub(crate) fn within_class(tokens: TokenStream, out: W, class_name: &str) -> Self {
        let mut e = Self::new(tokens, out);
        e.class_name = class_name.to_string();
        e
    }

    #[cfg(test)]
    pub(crate) fn scopes_mut(&mut self) -> &mut Scopes {
        &mut self.scopes
    }

    pub(crate) fn finish(self) -> Result<W> {
        Ok(self.code_gen.close()?)
    }

    fn unexpected<T>(&mut self, expected: &str) -> Result<T> {
        let line = self.tokens.peek_line();
        Err(CompileError::syntax(line, expected, self.tokens.peek()))
    }

    fn pop_token(&mut self, expected: &str) -> Result<Token> {
        match self.tokens.advance() {
            Some(t) => Ok(t),
            None => Err(CompileError::syntax(self.tokens.line(), expected, None)),
        }
    }

    fn mismatch<T>(&self, expected: &str, found: &Token) -> Result<T> {
        Err(CompileError::syntax(self.tokens.line(), expected, Some(found)))
    }

    fn pop_keyword_assert(&mut self, arg: &str) -> Result<()> {
        let expected = format!("`{arg}`");
        let next = self.pop_token(&expected)?;
        if next.is_keyword(arg) {
            Ok(())
        } else {
            self.mismatch(&expected, &next)
        }
    }

    fn pop_symbol_assert(&mut self, arg: char) -> Result<()> {
        let expected = format!("`{arg}`");
        let next = self.pop_token(&expected)?;
        if next.is_symbol(arg) {
            Ok(())
        } else {
            self.mismatch(&expected, &next)
        }
    }

    fn pop_identifier(&mut self) -> Result<String> {
        match self.pop_token("identifier")? {
            Token::Identifier(t) => Ok(t),
            t => self.mismatch("identifier", &t),
        }
    }

    fn pop_type(&mut self) -> Result<String> {
        match self.pop_token("type")? {
            Token::Keyword(t) if t == "int" || t == "boolean" || t == "char" => Ok(t),
            Token::Identifier(t) => Ok(t),
            t => self.mismatch("type", &t),
        }
    }

    fn next_is_symbol(&mut self, s: char) -> bool {
        matches!(self.tokens.peek(), Some(t) if t.is_symbol(s))
    }

    fn next_is_keyword(&mut self, s: &[&str]) -> bool {
        matches!(self.tokens.peek(), Some(Token::Keyword(t)) if s.contains(&t.as_str()))
    }

    fn next_op(&mut self) -> Option<char> {
        match self.tokens.peek() {
            Some(Token::Symbol(t)) if OPS.contains(t) => Some(*t),
            _ => None,
        }
    }

    fn resolve(&self, name: &str) -> Result<Symbol> {
        match self.scopes.resolve(name) {
            Some(sym) => Ok(sym.clone()),
            None => Err(CompileError::UnresolvedSymbol {
                line: self.tokens.line(),
                name: name.to_string(),
            }),
        }
    }

    fn define(&mut self, name: &str, tp: &str, kind: Kind) -> Result<()> {
        if self.scopes.var_count(kind) > MAX_INT {
            return Err(CompileError::TooManyVariables {
                line: self.tokens.line(),
                kind,
            });
        }
        if let Some(old) = self.scopes.define(name, tp, kind) {
            log::warn!(
                "{}: `{}` redeclared as {} {}, was {} {}",
                self.class_name,
                name,
                kind,
                tp,
                old.kind,
                old.tp
            );
        }
        Ok(())
    }

    fn fresh_label(&mut self, hint: &str) -> String {
        self.code_gen
            .fresh_label(&format!("{}.{}", self.class_name, hint))
    }

    pub(crate) fn compile_class(&mut self) -> Result<()> {
        self.pop_keyword_assert("class")?;
        self.class_name = self.pop_identifier()?;
        self.pop_symbol_assert('{')?;
        while self.next_is_keyword(&["static", "field"]) {
            self.compile_class_var_dec()?;
        }
        while self.next_is_keyword(&["constructor", "function", "method"]) {
            self.compile_sub_routine_dec()?;
        }
        self.pop_symbol_assert('}')?;
        if self.tokens.has_more_tokens() {
            return self.unexpected("end of input after class");
        }
        Ok(())
    }

    pub(crate) fn compile_class_var_dec(&mut self) -> Result<()> {
        let kind = match self.pop_token("`static` or `field`")? {
            Token::Keyword(k) if k == "static" => Kind::Static,
            Token::Keyword(k) if k == "field" => Kind::Field,
            t => return self.mismatch("`static` or `field`", &t),
        };
        let tp = self.pop_type()?;
        let name = self.pop_identifier()?;
        self.define(&name, &tp, kind)?;
        while self.next_is_symbol(',') {
            self.pop_symbol_assert(',')?;
            let name = self.pop_identifier()?;
            self.define(&name, &tp, kind)?;
        }
        self.pop_symbol_assert(';')
    }

    pub(crate) fn compile_sub_routine_dec(&mut self) -> Result<()> {
        self.scopes.start_subroutine();
        self.sub_kind = match self.pop_token("subroutine declaration")? {
            Token::Keyword(k) if k == "constructor" => SubroutineKind::Constructor,
            Token::Keyword(k) if k == "function" => SubroutineKind::Function,
            Token::Keyword(k) if k == "method" => SubroutineKind::Method,
            t => return self.mismatch("subroutine declaration", &t),
        };
        if self.next_is_keyword(&["void"]) {
            self.tokens.advance();
        } else {
            self.pop_type()?;
        }
        let name = self.pop_identifier()?;
        if self.sub_kind == SubroutineKind::Method {
            let class_name = self.class_name.clone();
            self.define("this", &class_name, Kind::Argument)?;
        }
        self.pop_symbol_assert('(')?;
        self.compile_parameter_list()?;
        self.pop_symbol_assert(')')?;
        log::trace!("compiling {:?} {}.{}", self.sub_kind, self.class_name, name);
        self.compile_sub_routine_body(&name)
    }

    pub(crate) fn compile_parameter_list(&mut self) -> Result<u16> {
        let mut count = 0;
        if !self.next_is_symbol(')') {
            loop {
                let tp = self.pop_type()?;
                let name = self.pop_identifier()?;
                self.define(&name, &tp, Kind::Argument)?;
                count += 1;
                if !self.next_is_symbol(',') {
                    break;
                }
                self.pop_symbol_assert(',')?;
            }
        }
        Ok(count)
    }

    pub(crate) fn compile_sub_routine_body(&mut self, name: &str) -> Result<()> {
        self.pop_symbol_assert('{')?;
        while self.next_is_keyword(&["var"]) {
            self.compile_var_dec()?;
        }
        let n_locals = self.scopes.var_count(Kind::Local);
        self.code_gen
            .write_function(&format!("{}.{}", self.class_name, name), n_locals)?;
        match self.sub_kind {
            SubroutineKind::Constructor => {
                let n_fields = self.scopes.var_count(Kind::Field);
                self.code_gen.write_push(Segment::Const, n_fields)?;
                self.code_gen.write_call(ALLOC, 1)?;
                self.code_gen.write_pop(Segment::Pointer, 0)?;
            }
            SubroutineKind::Method => {
                self.code_gen.write_push(Segment::Arg, 0)?;
                self.code_gen.write_pop(Segment::Pointer, 0)?;
            }
            SubroutineKind::Function => {}
        }
        self.compile_statements()?;
        self.pop_symbol_assert('}')
    }

    pub(crate) fn compile_var_dec(&mut self) -> Result<()> {
        self.pop_keyword_assert("var")?;
        let tp = self.pop_type()?;
        let name = self.pop_identifier()?;
        self.define(&name, &tp, Kind::Local)?;
        while self.next_is_symbol(',') {
            self.pop_symbol_assert(',')?;
            let name = self.pop_identifier()?;
            self.define(&name, &tp, Kind::Local)?;
        }
        self.pop_symbol_assert(';')
    }

    pub(crate) fn compile_statements(&mut self) -> Result<()> {
        loop {
            match self.tokens.peek() {
                Some(Token::Keyword(t)) if t == "let" => self.compile_let()?,
                Some(Token::Keyword(t)) if t == "if" => self.compile_if()?,
                Some(Token::Keyword(t)) if t == "while" => self.compile_while()?,
                Some(Token::Keyword(t)) if t == "do" => self.compile_do()?,
                Some(Token::Keyword(t)) if t == "return" => self.compile_return()?,
                _ => return Ok(()),
            }
        }
    }

    pub(crate) fn compile_let(&mut self) -> Result<()> {
        self.pop_keyword_assert("let")?;
        let name = self.pop_identifier()?;
        let target = self.resolve(&name)?;
        let seg = Segment::from(target.kind);
        if self.next_is_symbol('[') {
            self.code_gen.write_push(seg, target.index)?;
            self.pop_symbol_assert('[')?;
            self.compile_expression()?;
            self.pop_symbol_assert(']')?;
            self.code_gen.write_arithmetic(Command::Add)?;

            self.pop_symbol_assert('=')?;
            self.compile_expression()?;
            self.pop_symbol_assert(';')?;

            self.code_gen.write_pop(Segment::Temp, 0)?;
            self.code_gen.write_pop(Segment::Pointer, 1)?;
            self.code_gen.write_push(Segment::Temp, 0)?;
            self.code_gen.write_pop(Segment::That, 0)?;
        } else {
            self.pop_symbol_assert('=')?;
            self.compile_expression()?;
            self.pop_symbol_assert(';')?;
            self.code_gen.write_pop(seg, target.index)?;
        }
        Ok(())
    }

    pub(crate) fn compile_if(&mut self) -> Result<()> {
        self.pop_keyword_assert("if")?;
        self.pop_symbol_assert('(')?;
        self.compile_expression()?;
        self.pop_symbol_assert(')')?;

        let false_label = self.fresh_label("IF_FALSE");
        self.code_gen.write_arithmetic(Command::Not)?;
        self.code_gen.write_if(&false_label)?;

        self.pop_symbol_assert('{')?;
        self.compile_statements()?;
        self.pop_symbol_assert('}')?;

        if self.next_is_keyword(&["else"]) {
            self.tokens.advance();
            let end_label = self.fresh_label("IF_END");
            self.code_gen.write_goto(&end_label)?;
            self.code_gen.write_label(&false_label)?;
            self.pop_symbol_assert('{')?;
            self.compile_statements()?;
            self.pop_symbol_assert('}')?;
            self.code_gen.write_label(&end_label)?;
        } else {
            self.code_gen.write_label(&false_label)?;
        }
        Ok(())
    }

    pub(crate) fn compile_while(&mut self) -> Result<()> {
        self.pop_keyword_assert("while")?;
        let test_label = self.fresh_label("WHILE_EXP");
        let end_label = self.fresh_label("WHILE_END");

        self.code_gen.write_label(&test_label)?;
        self.pop_symbol_assert('(')?;
        self.compile_expression()?;
        self.pop_symbol_assert(')')?;
        self.code_gen.write_arithmetic(Command::Not)?;
        self.code_gen.write_if(&end_label)?;

        self.pop_symbol_assert('{')?;
        self.compile_statements()?;
        self.pop_symbol_assert('}')?;
        self.code_gen.write_goto(&test_label)?;
        self.code_gen.write_label(&end_label)?;
        Ok(())
    }

    pub(crate) fn compile_do(&mut self) -> Result<()> {
        self.pop_keyword_assert("do")?;
        let first = self.pop_identifier()?;
        self.compile_subroutine_call(first)?;
        self.pop_symbol_assert(';')?;
        // the language has no discard, so drop the return value into scratch
        self.code_gen.write_pop(Segment::Temp, 0)?;
        Ok(())
    }

    pub(crate) fn compile_return(&mut self) -> Result<()> {
        self.pop_keyword_assert("return")?;
        if self.next_is_symbol(';') {
            self.code_gen.write_push(Segment::Const, 0)?;
        } else {
            self.compile_expression()?;
        }
        self.pop_symbol_assert(';')?;
        self.code_gen.write_return()?;
        Ok(())
    }

    /// Operators apply strictly left to right, without precedence.
    pub(crate) fn compile_expression(&mut self) -> Result<Value> {
        let mut value = self.compile_term()?;
        while let Some(op) = self.next_op() {
            self.tokens.advance();
            self.compile_term()?;
            match op {
                '+' => self.code_gen.write_arithmetic(Command::Add)?,
                '-' => self.code_gen.write_arithmetic(Command::Sub)?,
                '*' => self.code_gen.write_call(MULTIPLY, 2)?,
                '/' => self.code_gen.write_call(DIVIDE, 2)?,
                '&' => self.code_gen.write_arithmetic(Command::And)?,
                '|' => self.code_gen.write_arithmetic(Command::Or)?,
                '<' => self.code_gen.write_arithmetic(Command::Lt)?,
                '>' => self.code_gen.write_arithmetic(Command::Gt)?,
                _ => self.code_gen.write_arithmetic(Command::Eq)?,
            }
            value = Value::Binary;
        }
        Ok(value)
    }

    pub(crate) fn compile_term(&mut self) -> Result<Value> {
        let next = self.pop_token("term")?;
        match next {
            Token::IntegerConstant(i) => {
                self.code_gen.write_push(Segment::Const, i)?;
                Ok(Value::Constant)
            }
            Token::StringConstant(s) => {
                self.compile_string(&s)?;
                Ok(Value::Constant)
            }
            Token::Keyword(k) => {
                match k.as_str() {
                    "true" => {
                        self.code_gen.write_push(Segment::Const, 1)?;
                        self.code_gen.write_arithmetic(Command::Neg)?;
                    }
                    "false" | "null" => self.code_gen.write_push(Segment::Const, 0)?,
                    "this" => self.code_gen.write_push(Segment::Pointer, 0)?,
                    _ => return self.mismatch("term", &Token::Keyword(k.clone())),
                }
                Ok(Value::Constant)
            }
            Token::Symbol('(') => {
                self.compile_expression()?;
                self.pop_symbol_assert(')')?;
                Ok(Value::Grouped)
            }
            Token::Symbol(s @ ('-' | '~')) => {
                self.compile_term()?;
                let cmd = if s == '-' { Command::Neg } else { Command::Not };
                self.code_gen.write_arithmetic(cmd)?;
                Ok(Value::Unary(cmd))
            }
            Token::Identifier(name) => {
                if self.next_is_symbol('[') {
                    let arr = self.resolve(&name)?;
                    self.code_gen.write_push(arr.kind.into(), arr.index)?;
                    self.pop_symbol_assert('[')?;
                    self.compile_expression()?;
                    self.pop_symbol_assert(']')?;
                    self.code_gen.write_arithmetic(Command::Add)?;

                    self.code_gen.write_pop(Segment::Pointer, 1)?;
                    self.code_gen.write_push(Segment::That, 0)?;
                    Ok(Value::ArrayElement)
                } else if self.next_is_symbol('(') || self.next_is_symbol('.') {
                    let call = self.compile_subroutine_call(name)?;
                    Ok(Value::Returned(call))
                } else {
                    let var = self.resolve(&name)?;
                    self.code_gen.write_push(var.kind.into(), var.index)?;
                    Ok(Value::Variable(var.kind))
                }
            }
            t => self.mismatch("term", &t),
        }
    }

    fn compile_string(&mut self, s: &str) -> Result<()> {
        let len = s.chars().count();
        let len = match u16::try_from(len) {
            Ok(len) if len <= MAX_INT => len,
            _ => {
                return Err(CompileError::lex(
                    self.tokens.line(),
                    &format!("string constant of {len} characters is too long"),
                ));
            }
        };
        self.code_gen.write_push(Segment::Const, len)?;
        self.code_gen.write_call(STRING_NEW, 1)?;
        for c in s.chars() {
            let code = match u16::try_from(u32::from(c)) {
                Ok(code) if code <= MAX_INT => code,
                _ => {
                    return Err(CompileError::lex(
                        self.tokens.line(),
                        &format!("character `{c}` has no code up to {MAX_INT}"),
                    ));
                }
            };
            self.code_gen.write_push(Segment::Const, code)?;
            self.code_gen.write_call(STRING_APPEND, 2)?;
        }
        Ok(())
    }

    /// Compiles a call whose leading identifier `first` was already consumed.
    pub(crate) fn compile_subroutine_call(&mut self, first: String) -> Result<Call> {
        let (name, receivers) = if self.next_is_symbol('(') {
            self.code_gen.write_push(Segment::Pointer, 0)?;
            (format!("{}.{}", self.class_name, first), 1)
        } else if self.next_is_symbol('.') {
            self.tokens.advance();
            let member = self.pop_identifier()?;
            match self.scopes.resolve(&first).cloned() {
                Some(obj) => {
                    self.code_gen.write_push(obj.kind.into(), obj.index)?;
                    (format!("{}.{}", obj.tp, member), 1)
                }
                None => (format!("{first}.{member}"), 0),
            }
        } else {
            return self.unexpected("`(` or `.`");
        };
        self.pop_symbol_assert('(')?;
        let n_args = self.compile_expression_list()? + receivers;
        self.pop_symbol_assert(')')?;
        self.code_gen.write_call(&name, n_args)?;
        Ok(Call { name, n_args })
    }

    pub(crate) fn compile_expression_list(&mut self) -> Result<u16> {
        let mut count = 0;
        if !self.next_is_symbol(')') {
            self.compile_expression()?;
            count += 1;
            while self.next_is_symbol(',') {
                self.tokens.advance();
                self.compile_expression()?;
                count += 1;
            }
        }
        return Ok(count);
    }
}

impl<W: Write> CompilationEngine<W> for VmCompilationEngine<W> {
    fn output_extension() -> &'static str {
        "vm"
    }

    fn compile(tokens: TokenStream, out: W) -> Result<W> {
        let mut e = VmCompilationEngine::new(tokens, out);
        e.compile_class()?;
        e.finish()
    }
}
