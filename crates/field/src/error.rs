// Copyright 2025 Irreducible Inc.

#[allow(missing_docs)] // errors are self-documenting
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
	#[error("division by zero")]
	DivideByZero,
	#[error("invalid field element literal {0:?}")]
	InvalidLiteral(String),
	#[error("unknown field {0:?}")]
	UnknownField(String),
}
