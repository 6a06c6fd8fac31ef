use super::asm::{Mem, MemSize};

/// Byte size of an Arhi type name.
pub fn type_size(type_name: &str) -> u32 {
    match type_name {
        "int64" | "uint64" => 8,
        "int32" | "uint32" => 4,
        "int16" | "uint16" => 2,
        "int8" | "uint8" | "byte" | "bool" | "boolean" => 1,
        _ => 0, // void
    }
}

pub fn is_boolean_type(type_name: &str) -> bool {
    type_name == "bool" || type_name == "boolean"
}

pub fn is_unsigned_type(type_name: &str) -> bool {
    type_name.starts_with('u')
}

/// A declared local or parameter. Immutable once created; reassignment only
/// changes the emitted code, never this record.
#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    pub offset: u32,
    pub type_name: String,
    pub size: u32,
    pub unsigned: bool,
    pub mutable: bool,
    pub boolean: bool,
    pub array: bool,
}

impl Variable {
    pub fn mem_size(&self) -> MemSize {
        MemSize::try_from(self.size).unwrap_or(MemSize::Byte)
    }

    /// The variable's frame slot.
    pub fn mem(&self) -> Mem {
        Mem::frame(self.offset, self.mem_size())
    }
}

#[derive(Debug, Default)]
pub struct Frame {
    pub bytes: u32,
    pub vars: Vec<Variable>,
}

/// The scope stack: one frame per open brace, innermost last.
#[derive(Debug, Default)]
pub struct ScopeStack {
    frames: Vec<Frame>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&mut self) {
        self.frames.push(Frame::default());
    }

    pub fn leave(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Declares a variable in the innermost frame. The slot is frame base
    /// minus the cumulative byte count, so the frame grows downward.
    pub fn declare(
        &mut self,
        name: &str,
        type_name: &str,
        size: u32,
        mutable: bool,
        array: bool,
    ) -> Option<Variable> {
        let frame = self.frames.last_mut()?;
        frame.bytes += size;
        let var = Variable {
            name: String::from(name),
            offset: frame.bytes,
            type_name: String::from(type_name),
            size,
            unsigned: is_unsigned_type(type_name),
            mutable,
            boolean: is_boolean_type(type_name),
            array,
        };
        frame.vars.push(var.clone());
        Some(var)
    }

    /// Inserts a variable whose slot was computed elsewhere (parameter
    /// binding) into the innermost frame.
    pub fn adopt(&mut self, var: Variable) {
        if let Some(frame) = self.frames.last_mut() {
            frame.bytes += var.size;
            frame.vars.push(var);
        }
    }

    /// Searches frames in the order they were pushed, outermost first, and
    /// returns the first name match. An inner declaration therefore does
    /// not shadow an outer one with the same name.
    pub fn lookup(&self, name: &str) -> Option<&Variable> {
        self.frames
            .iter()
            .flat_map(|frame| frame.vars.iter())
            .find(|var| var.name == name)
    }
}

#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub return_size: u32,
    pub params: Vec<Variable>,
    pub return_type: String,
}

/// Flat table of every function seen so far; names are expected unique and
/// the first registration wins on lookup.
#[derive(Debug, Default)]
pub struct FunctionTable {
    functions: Vec<Function>,
}

impl FunctionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, function: Function) -> usize {
        self.functions.push(function);
        self.functions.len() - 1
    }

    pub fn get(&self, index: usize) -> &Function {
        &self.functions[index]
    }

    pub fn lookup(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_offsets_grow_downward() {
        let mut scope = ScopeStack::new();
        scope.enter();
        let a = scope.declare("a", "int32", 4, false, false).unwrap();
        let b = scope.declare("b", "int64", 8, false, false).unwrap();
        assert_eq!(a.offset, 4);
        assert_eq!(b.offset, 12);
        assert_eq!(format!("{}", b.mem()), "qword [rbp-12]");
    }

    #[test]
    fn lookup_prefers_the_outermost_declaration() {
        let mut scope = ScopeStack::new();
        scope.enter();
        scope.declare("x", "int32", 4, false, false).unwrap();
        scope.enter();
        scope.declare("x", "int64", 8, false, false).unwrap();

        let found = scope.lookup("x").unwrap();
        assert_eq!(found.size, 4, "outer declaration wins over the inner one");
    }

    #[test]
    fn leaving_a_frame_drops_its_variables() {
        let mut scope = ScopeStack::new();
        scope.enter();
        scope.enter();
        scope.declare("tmp", "byte", 1, false, false).unwrap();
        scope.leave();
        assert!(scope.lookup("tmp").is_none());
        assert_eq!(scope.depth(), 1);
    }

    #[test]
    fn first_registered_function_wins() {
        let mut table = FunctionTable::new();
        table.register(Function {
            name: String::from("f"),
            return_size: 4,
            params: Vec::new(),
            return_type: String::from("int32"),
        });
        table.register(Function {
            name: String::from("f"),
            return_size: 8,
            params: Vec::new(),
            return_type: String::from("int64"),
        });
        assert_eq!(table.lookup("f").unwrap().return_size, 4);
    }

    #[test]
    fn type_sizes() {
        assert_eq!(type_size("int64"), 8);
        assert_eq!(type_size("uint32"), 4);
        assert_eq!(type_size("int16"), 2);
        assert_eq!(type_size("bool"), 1);
        assert_eq!(type_size("byte"), 1);
        assert_eq!(type_size("void"), 0);
    }
}
