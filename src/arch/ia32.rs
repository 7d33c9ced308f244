//! Fragmentos para ia32.
//!
//! `%eax` guarda el desplazamiento del cursor y la cinta vive en la
//! pila. Las llamadas al sistema usan `int $0x80`, por lo cual `%eax`
//! se respalda en `%esi` alrededor de cada una.

use super::Fragments;

pub const FRAGMENTS: Fragments = Fragments {
    program_start: r"
.globl _start
_start:
    start:
    # for(int i = 0; i < 30000; ++i) buff[i] = 0
    subl	$30000,%esp
    movl        $0,%eax
zero_buff_start:
    cmpl        $30000,%eax
    je          zero_buff_end
    movb        $0,0(%esp,%eax,1)
    incl        %eax
    jmp         zero_buff_start
zero_buff_end:
    # initialise data pointer
    movl	$0,%eax",

    program_end: r"
    addl	$30000,%esp
    movl	$1,%eax
    movl	$0,%ebx
    int		$0x80
",

    read_char: r"
    movl	%eax,%esi # save eax
    # read(stdin, &(buffer[eax]), 1)
    movl	%eax,%ecx
    addl	%esp,%ecx
    movl	$3,%eax
    movl	$0,%ebx
    movl	$1,%edx
    int		$0x80
    movl	%esi,%eax # restore eax",

    write_char: r"
    movl	%eax,%esi # save eax
    # write(stdout, &(buffer[eax]), 1)
    movl	%eax,%ecx
    addl	%esp,%ecx
    movl	$4,%eax
    movl	$1,%ebx
    movl	$1,%edx
    int		$0x80
    movl	%esi,%eax # restore eax",

    dp_left: r"
    decl	%eax",

    dp_right: r"
    incl        %eax",

    dp_inc: r"
    incb	0(%esp, %eax, 1)",

    dp_dec: r"
    decb	0(%esp, %eax, 1)",

    begin_while: [
        r"
    movb	0(%esp, %eax, 1),%bl
    testb	%bl,%bl
    je		end_",
        r"
begin_",
        ":",
    ],

    end_while: [
        r"
    movb	0(%esp, %eax, 1),%bl
    testb	%bl,%bl
    jne		begin_",
        r"
end_",
        ":",
    ],

    dp_left_by: (
        r"
    subl        $0x",
        ", %eax",
    ),

    dp_right_by: (
        r"
    addl        $0x",
        ", %eax",
    ),

    dp_inc_by: (
        r"
    addb	$0x",
        ", 0(%esp, %eax, 1)",
    ),

    dp_dec_by: (
        r"
    subb	$0x",
        ", 0(%esp, %eax, 1)",
    ),
};
