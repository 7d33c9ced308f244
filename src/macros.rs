/// Declara el conjunto cerrado de built-ins con sus nombres y parámetros.
macro_rules! builtins {
    ($($variant:ident => $name:literal ($($param:ident),*)),* $(,)?) => {
        /// Macro primitiva de la biblioteca integrada.
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
        pub enum Builtin {
            $($variant),*
        }

        impl Builtin {
            pub const ALL: &'static [Builtin] = &[$(Builtin::$variant),*];

            /// Nombre con el que se invoca desde el lenguaje de macros.
            pub fn name(self) -> &'static str {
                match self {
                    $(Builtin::$variant => $name),*
                }
            }

            /// Nombres de los parámetros formales.
            pub fn params(self) -> &'static [&'static str] {
                match self {
                    $(Builtin::$variant => &[$(stringify!($param)),*]),*
                }
            }
        }
    };
}

/// Genera una función constructora por built-in, con un parámetro por operando.
macro_rules! builtin_wrappers {
    ($($function:ident => $variant:ident ($($param:ident),*)),* $(,)?) => {
        $(
            pub fn $function($($param: impl Into<Atom>),*) -> Node {
                call_builtin(Builtin::$variant, vec![$($param.into()),*])
            }
        )*
    };
}

/// Escribe un fragmento de ensamblador, opcionalmente seguido de texto con formato.
macro_rules! emit {
    ($output:expr, $fragment:expr) => {
        $output.write_all($fragment.as_bytes())
    };

    ($output:expr, $fragment:expr, $($format:tt)*) => {{
        $output.write_all($fragment.as_bytes())?;
        write!($output, $($format)*)
    }};
}
