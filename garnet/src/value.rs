use std::{fmt, sync::Arc};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::{MutableString, Proc, RubyError, RubyHash, RubyResult, SymbolId};

/// Reference to a runtime object. Clones alias the same object, and
/// equality of handles is identity.
pub struct Shared<T>(Arc<RwLock<T>>);

pub type StringRef = Shared<MutableString>;
pub type ArrayRef = Shared<Vec<Value>>;
pub type HashRef = Shared<RubyHash>;
pub type ProcRef = Shared<Proc>;

impl<T> Shared<T> {
    pub fn new(value: T) -> Self {
        Self(Arc::new(RwLock::new(value)))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.0.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.0.write()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Address of the object, stable for its lifetime.
    pub fn object_id(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

// objects may contain themselves, so only the address is printed
impl<T> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Shared({:#x})", self.object_id())
    }
}

impl<T> PartialEq for Shared<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<T> Eq for Shared<T> {}

#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Fixnum(i64),
    Float(f64),
    Symbol(SymbolId),
    String(StringRef),
    Array(ArrayRef),
    Hash(HashRef),
    Proc(ProcRef),
}

impl Value {
    pub fn string(string: MutableString) -> Self {
        Self::String(Shared::new(string))
    }

    pub fn str(text: &str) -> Self {
        Self::string(MutableString::literal(text))
    }

    pub fn array(values: Vec<Value>) -> Self {
        Self::Array(Shared::new(values))
    }

    pub fn hash(hash: RubyHash) -> Self {
        Self::Hash(Shared::new(hash))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    /// Everything except `nil` and `false` is true.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Self::Nil | Self::Bool(false))
    }

    pub fn class_name(&self) -> &'static str {
        match self {
            Self::Nil => "NilClass",
            Self::Bool(true) => "TrueClass",
            Self::Bool(false) => "FalseClass",
            Self::Fixnum(_) => "Fixnum",
            Self::Float(_) => "Float",
            Self::Symbol(_) => "Symbol",
            Self::String(_) => "String",
            Self::Array(_) => "Array",
            Self::Hash(_) => "Hash",
            Self::Proc(_) => "Proc",
        }
    }

    fn conversion_error(&self, target: &str) -> RubyError {
        let source = match self {
            Self::Nil => "nil",
            Self::Bool(true) => "true",
            Self::Bool(false) => "false",
            other => other.class_name(),
        };
        RubyError::Type(format!("no implicit conversion of {source} into {target}"))
    }

    pub fn as_fixnum(&self) -> RubyResult<i64> {
        match self {
            Self::Fixnum(n) => Ok(*n),
            other => Err(other.conversion_error("Integer")),
        }
    }

    pub fn as_string(&self) -> RubyResult<&StringRef> {
        match self {
            Self::String(s) => Ok(s),
            other => Err(other.conversion_error("String")),
        }
    }

    pub fn as_array(&self) -> RubyResult<&ArrayRef> {
        match self {
            Self::Array(a) => Ok(a),
            other => Err(other.conversion_error("Array")),
        }
    }

    pub fn as_hash(&self) -> RubyResult<&HashRef> {
        match self {
            Self::Hash(h) => Ok(h),
            other => Err(other.conversion_error("Hash")),
        }
    }

    pub fn as_proc(&self) -> RubyResult<&ProcRef> {
        match self {
            Self::Proc(p) => Ok(p),
            other => Err(other.conversion_error("Proc")),
        }
    }

    /// Same object: immediates by value, references by address.
    pub fn identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Nil, Self::Nil) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Fixnum(a), Self::Fixnum(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Symbol(a), Self::Symbol(b)) => a == b,
            (Self::String(a), Self::String(b)) => a.ptr_eq(b),
            (Self::Array(a), Self::Array(b)) => a.ptr_eq(b),
            (Self::Hash(a), Self::Hash(b)) => a.ptr_eq(b),
            (Self::Proc(a), Self::Proc(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Fixnum(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<MutableString> for Value {
    fn from(value: MutableString) -> Self {
        Self::string(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_alias_one_object() {
        let a = Value::str("abc");
        let b = a.clone();
        a.as_string().unwrap().write().append_char('d').unwrap();
        assert_eq!(b.as_string().unwrap().read().to_string(), "abcd");
        assert!(a.identical(&b));
        assert!(!a.identical(&Value::str("abcd")), "equal text, other object");
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(Value::Fixnum(0).is_truthy());
        assert!(Value::str("").is_truthy());
    }

    #[test]
    fn failed_conversions_name_both_types() {
        let err = Value::Fixnum(1).as_string().unwrap_err();
        assert_eq!(err.to_string(), "no implicit conversion of Fixnum into String");
        assert_eq!(err.class_name(), "TypeError");
        let err = Value::Nil.as_array().unwrap_err();
        assert_eq!(err.to_string(), "no implicit conversion of nil into Array");
    }

    #[test]
    fn self_containing_array_prints() {
        let array = Value::array(vec![]);
        let handle = array.as_array().unwrap().clone();
        handle.write().push(array.clone());
        assert!(format!("{array:?}").starts_with("Array(Shared("));
    }
}
