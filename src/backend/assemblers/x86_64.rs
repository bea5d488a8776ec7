/// Accumulates NASM text for one generation run
#[derive(Debug, Default)]
pub struct Assembler {
    output: String,
    emit_comments: bool,
}

impl Assembler {
    pub fn new(emit_comments: bool) -> Self {
        Self {
            output: String::new(),
            emit_comments,
        }
    }

    pub fn into_output(self) -> String {
        self.output
    }

    fn push_line(&mut self, string: impl AsRef<str>) {
        self.output.push_str(string.as_ref());
        self.output.push('\n');
    }

    pub fn blank_line(&mut self) {
        self.output.push('\n');
    }

    pub fn emit(&mut self, string: impl AsRef<str>) {
        self.output.push_str("    ");
        self.push_line(string);
    }

    pub fn label(&mut self, name: impl AsRef<str>) {
        self.push_line(format!("{}:", name.as_ref()));
    }

    pub fn comment(&mut self, comment: impl AsRef<str>) {
        if self.emit_comments {
            self.emit(format!("; {}", comment.as_ref()));
        }
    }

    pub fn push(&mut self, register: X86FullRegister) {
        self.emit(format!("push {register}"));
    }

    pub fn pop(&mut self, register: X86FullRegister) {
        self.emit(format!("pop {register}"));
    }

    pub fn function_prologue(&mut self, stack_frame_size: usize) {
        self.push(X86FullRegister::Rbp);
        self.emit("mov rbp, rsp");

        if stack_frame_size > 0 {
            self.emit(format!("sub rsp, {stack_frame_size}"));
        }
    }

    pub fn function_epilogue(&mut self) {
        self.emit("mov rsp, rbp");
        self.pop(X86FullRegister::Rbp);
        self.emit("ret");
    }

    /// Loads the stack slot `offset` bytes below the frame base
    pub fn load_slot(&mut self, destination: X86FullRegister, offset: i64) {
        self.emit(format!("mov {destination}, {}", frame_address(offset)));
    }

    /// Stores into the stack slot `offset` bytes below the frame base
    pub fn store_slot(&mut self, offset: i64, source: X86FullRegister) {
        self.emit(format!("mov {}, {source}", frame_address(offset)));
    }
}

/// Memory operand for a slot `offset` bytes below `rbp`. Parameters have
/// negative offsets and so live above it.
pub fn frame_address(offset: i64) -> String {
    if offset < 0 {
        format!("qword [rbp + {}]", -offset)
    } else {
        format!("qword [rbp - {offset}]")
    }
}

/// General Purpose Register 64-bit
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum X86FullRegister {
    Rax,
    Rbx,
    Rcx,
    Rdx,
    Rsi,
    Rdi,
    Rbp,
    Rsp,
}

impl X86FullRegister {
    pub fn as_8_bit(self) -> X86ByteRegister {
        match self {
            Self::Rax => X86ByteRegister::Al,
            Self::Rbx => X86ByteRegister::Bl,
            Self::Rcx => X86ByteRegister::Cl,
            Self::Rdx => X86ByteRegister::Dl,
            Self::Rsi => X86ByteRegister::Sil,
            Self::Rdi => X86ByteRegister::Dil,
            Self::Rbp => X86ByteRegister::Bpl,
            Self::Rsp => X86ByteRegister::Spl,
        }
    }
}

/// Low byte of a general purpose register
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
#[rustfmt::skip]
pub enum X86ByteRegister {
    Al, Bl, Cl, Dl,
    Sil, Dil, Bpl, Spl,
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    #[test]
    fn frame_addresses_straddle_the_frame_base() {
        assert_eq!(frame_address(8), "qword [rbp - 8]");
        assert_eq!(frame_address(-16), "qword [rbp + 16]");
    }

    #[test]
    fn register_names() {
        assert_eq!(X86FullRegister::Rbx.to_string(), "rbx");
        assert_eq!(X86FullRegister::Rax.as_8_bit().to_string(), "al");
    }

    #[test]
    fn prologue_skips_empty_frames() {
        let mut assembler = Assembler::new(true);
        assembler.label("_f");
        assembler.function_prologue(0);
        assembler.comment("Return");
        assembler.function_epilogue();

        assert_eq!(
            assembler.into_output(),
            indoc! {"
                _f:
                    push rbp
                    mov rbp, rsp
                    ; Return
                    mov rsp, rbp
                    pop rbp
                    ret
            "}
        );
    }

    #[test]
    fn comments_can_be_disabled() {
        let mut assembler = Assembler::new(false);
        assembler.comment("hidden");
        assembler.store_slot(24, X86FullRegister::Rax);

        assert_eq!(assembler.into_output(), "    mov qword [rbp - 24], rax\n");
    }
}
