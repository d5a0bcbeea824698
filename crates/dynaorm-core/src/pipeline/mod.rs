//! Built-in field transforms.
//!
//! Each function returns a closure ready to hand to
//! [`FieldDescriptor::mutate`](crate::catalog::FieldDescriptor::mutate),
//! [`validate`](crate::catalog::FieldDescriptor::validate) or
//! [`default_with`](crate::catalog::FieldDescriptor::default_with).

pub mod defaults;
pub mod mutators;
pub mod validators;
