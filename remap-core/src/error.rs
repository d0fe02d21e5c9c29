/// Errors raised by the type model and the accessor tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A type was forward-declared but never given a definition.
    UndefinedType {
        /// Name of the declared type.
        name: String,
    },

    /// Two definitions were given for the same type name.
    DuplicateType {
        /// The name that was defined twice.
        name: String,
    },

    /// A member was accessed on a value that is not an object.
    NotAStruct {
        /// The type the member belongs to.
        ty: String,
        /// The member that was accessed.
        member: String,
    },

    /// A member was read from or written to through a null reference.
    NullTarget {
        /// The type the member belongs to.
        ty: String,
        /// The member that was accessed.
        member: String,
    },

    /// The member has no getter.
    NotReadable {
        /// The type the member belongs to.
        ty: String,
        /// The member that was read.
        member: String,
    },

    /// The member has no setter.
    NotWritable {
        /// The type the member belongs to.
        ty: String,
        /// The member that was written.
        member: String,
    },

    /// The type cannot be default-constructed.
    NotConstructible {
        /// Name of the type.
        ty: String,
    },

    /// An object of one type was handed to an accessor of another.
    TypeMismatch {
        /// The type the accessor belongs to.
        expected: String,
        /// The type of the object that was handed over.
        found: String,
    },

    /// A sequence was indexed past its end.
    IndexOutOfBounds {
        /// The requested index.
        index: usize,
        /// The length of the sequence.
        len: usize,
    },

    /// An element was appended to a fixed-size array.
    FixedSize {
        /// The length of the array.
        len: usize,
    },
}

impl core::fmt::Display for CoreError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            CoreError::UndefinedType { name } => {
                write!(f, "type `{name}` was declared but never defined")
            }
            CoreError::DuplicateType { name } => write!(f, "type `{name}` is defined twice"),
            CoreError::NotAStruct { ty, member } => {
                write!(f, "cannot access `{ty}.{member}`: value is not an object")
            }
            CoreError::NullTarget { ty, member } => {
                write!(f, "cannot access `{ty}.{member}` through a null reference")
            }
            CoreError::NotReadable { ty, member } => write!(f, "`{ty}.{member}` is not readable"),
            CoreError::NotWritable { ty, member } => write!(f, "`{ty}.{member}` is not writable"),
            CoreError::NotConstructible { ty } => {
                write!(f, "type `{ty}` cannot be default-constructed")
            }
            CoreError::TypeMismatch { expected, found } => {
                write!(f, "expected an object of type `{expected}`, found `{found}`")
            }
            CoreError::IndexOutOfBounds { index, len } => {
                write!(f, "index {index} is out of bounds for a sequence of length {len}")
            }
            CoreError::FixedSize { len } => {
                write!(f, "cannot append to a fixed-size array of length {len}")
            }
        }
    }
}

impl core::error::Error for CoreError {}
