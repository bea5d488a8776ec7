use crate::{backend::CodegenOptions, error::CompileResult, frontend::ast::Node};

mod x86_64_linux_gnu;

pub use x86_64_linux_gnu::PRINT_INT_RUNTIME;

pub trait CodeGenerator {
    /// Lowers a parsed program to a complete assembly file. Nothing is
    /// returned unless the whole tree lowers successfully.
    fn translate_to_asm(&self, root: Option<&Node>, options: &CodegenOptions)
    -> CompileResult<String>;
}

#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Target {
    #[default]
    x86_64LinuxGnu,
}

impl Target {
    pub fn get_code_generator(self) -> impl CodeGenerator {
        match self {
            Target::x86_64LinuxGnu => x86_64_linux_gnu::CodeGeneratorX86_64LinuxGnu,
        }
    }
}
