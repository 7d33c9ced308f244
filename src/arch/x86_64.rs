//! Fragmentos para x86-64.
//!
//! Convenciones:
//! - `%rbx` guarda el desplazamiento del cursor dentro de la cinta.
//! - La cinta se reserva en la pila, de manera que `%rsp + %rbx` es
//!   la dirección de la celda bajo el cursor.
//! - `%al` es memoria de trabajo para las pruebas de ciclo.
//! - El punto de entrada es `_start`, ya que se enlaza con `-nostdlib`.

use super::Fragments;

pub const FRAGMENTS: Fragments = Fragments {
    // Reserva la cinta, la inicializa en cero y coloca el cursor en 0
    program_start: r"
.globl _start
_start:
    start:
    subq	$30000,%rsp
    movq    $0,%rbx
zero_buff_start:
    cmpq    $30000,%rbx
    je      zero_buff_end
    movq    $0x0,0(%rsp,%rbx,1)
    incq    %rbx
    jmp     zero_buff_start
zero_buff_end:
    movq	$0,%rbx",

    // exit(0)
    program_end: r"
    addq	$30000,%rsp
    movq	$60,%rax
    movq	$0,%rdi
    syscall
",

    // read(0, &tape[dp], 1)
    read_char: r"
    movq	%rbx,%rsi
    addq	%rsp,%rsi
    movq	$0,%rax
    movq	$0,%rdi
    movq	$1,%rdx
    syscall",

    // write(1, &tape[dp], 1)
    write_char: r"
    movq	%rbx,%rsi
    addq	%rsp,%rsi
    movq	$1,%rax
    movq	$1,%rdi
    movq	$1,%rdx
    syscall",

    dp_left: r"
    decq	%rbx",

    dp_right: r"
    incq        %rbx",

    dp_inc: r"
    incb	0(%rsp, %rbx, 1)",

    dp_dec: r"
    decb	0(%rsp, %rbx, 1)",

    begin_while: [
        r"
    movb	0(%rsp, %rbx, 1),%al
    testb	%al,%al
    je		end_",
        r"
begin_",
        ":",
    ],

    end_while: [
        r"
    movb	0(%rsp, %rbx, 1),%al
    testb	%al,%al
    jne		begin_",
        r"
end_",
        ":",
    ],

    dp_left_by: (
        r"
    subq        $0x",
        ", %rbx",
    ),

    dp_right_by: (
        r"
    addq        $0x",
        ", %rbx",
    ),

    dp_inc_by: (
        r"
    addb	$0x",
        ", 0(%rsp, %rbx, 1)",
    ),

    dp_dec_by: (
        r"
    subb	$0x",
        ", 0(%rsp, %rbx, 1)",
    ),
};
