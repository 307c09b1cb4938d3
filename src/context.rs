//! Parser Context: the lambda parameters of the expression being parsed and
//! the stack of lexical scope frames.
//!
//! Frames live in an owned vector; lookups walk it from the innermost frame
//! outward.  A name may be shadowed by an inner frame but not redeclared in
//! the same one.

use indexmap::IndexMap;
use log::debug;
use std::collections::HashMap;

use crate::error::{CompileError, Result};
use crate::expr::{LabelTarget, Variable};
use crate::types::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Block,
    Loop,
    Switch,
    Lambda,
}

#[derive(Debug)]
pub struct Frame {
    pub kind: FrameKind,
    pub variables: IndexMap<String, Variable>,
    pub labels: HashMap<String, LabelTarget>,
    pub break_label: Option<LabelTarget>,
    pub continue_label: Option<LabelTarget>,
    /// Lambda frames only: where `return` jumps and the type it returns.
    pub return_label: Option<LabelTarget>,
    pub return_type: Option<Type>,
    /// Number of `return` statements that jump to `return_label`.
    pub returns: usize,
}

impl Frame {
    fn new(kind: FrameKind) -> Self {
        Frame {
            kind,
            variables: IndexMap::new(),
            labels: HashMap::new(),
            break_label: None,
            continue_label: None,
            return_label: None,
            return_type: None,
            returns: 0,
        }
    }
}

#[derive(Debug, Default)]
pub struct ParserContext {
    parameters: Vec<Variable>,
    frames: Vec<Frame>,
}

impl ParserContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parameters of the top-level lambda.
    pub fn parameters(&self) -> &[Variable] {
        &self.parameters
    }

    pub fn set_parameters(&mut self, parameters: Vec<Variable>) {
        self.parameters = parameters;
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn push(&mut self, kind: FrameKind) {
        debug!("Entering {:?} frame at depth {}", kind, self.frames.len());

        self.frames.push(Frame::new(kind));
    }

    /// Loop frame with its jump targets.
    pub fn push_loop(&mut self, break_label: LabelTarget, continue_label: LabelTarget) {
        self.push(FrameKind::Loop);
        if let Some(frame) = self.frames.last_mut() {
            frame.break_label = Some(break_label);
            frame.continue_label = Some(continue_label);
        }
    }

    pub fn push_switch(&mut self, break_label: LabelTarget) {
        self.push(FrameKind::Switch);
        if let Some(frame) = self.frames.last_mut() {
            frame.break_label = Some(break_label);
        }
    }

    /// Lambda frame declaring `params`, with `return` jumping to `return_label`.
    pub fn push_lambda(&mut self, params: &[Variable], return_label: LabelTarget, return_type: Option<Type>) {
        self.push(FrameKind::Lambda);
        if let Some(frame) = self.frames.last_mut() {
            for p in params {
                frame.variables.insert(p.name.clone(), p.clone());
            }
            frame.return_label = Some(return_label);
            frame.return_type = return_type;
        }
    }

    /// Leave the innermost frame; its variables go to the enclosing block node.
    pub fn pop(&mut self) -> Option<Frame> {
        let frame = self.frames.pop();

        if let Some(f) = &frame {
            debug!("Leaving {:?} frame with {} variables", f.kind, f.variables.len());
        }

        frame
    }

    /// Drop frames left open by a parse that failed part way.
    pub fn unwind(&mut self, depth: usize) {
        while self.frames.len() > depth {
            self.pop();
        }
    }

    pub fn declare(&mut self, name: &str, ty: Type, offset: usize) -> Result<Variable> {
        let Some(frame) = self.frames.last_mut() else {
            return Err(CompileError::invalid(offset, "Declaration outside of any scope"));
        };

        if frame.variables.contains_key(name) {
            return Err(CompileError::DuplicateVariableDeclaration {
                offset,
                name: name.to_string(),
            });
        }

        let variable = Variable::new(name, ty);
        frame.variables.insert(name.to_string(), variable.clone());

        debug!("Declared '{}' ({}) at depth {}", name, variable.ty, self.frames.len());

        Ok(variable)
    }

    /// Innermost visible variable or parameter called `name`.
    pub fn lookup(&self, name: &str) -> Option<&Variable> {
        self.frames
            .iter()
            .rev()
            .find_map(|f| f.variables.get(name))
            .or_else(|| self.parameters.iter().find(|p| p.name == name))
    }

    /// Label visible from here, created in the innermost frame when unseen
    /// (forward `goto`).
    pub fn label(&mut self, name: &str) -> LabelTarget {
        if let Some(label) = self.frames.iter().rev().find_map(|f| f.labels.get(name)) {
            return label.clone();
        }

        let label = LabelTarget::new(name);
        if let Some(frame) = self.frames.last_mut() {
            frame.labels.insert(name.to_string(), label.clone());
        }
        label
    }

    pub fn break_target(&self) -> Option<&LabelTarget> {
        self.frames
            .iter()
            .rev()
            .take_while(|f| f.kind != FrameKind::Lambda)
            .find_map(|f| f.break_label.as_ref())
    }

    pub fn continue_target(&self) -> Option<&LabelTarget> {
        self.frames
            .iter()
            .rev()
            .take_while(|f| f.kind != FrameKind::Lambda)
            .find_map(|f| f.continue_label.as_ref())
    }

    /// Innermost enclosing lambda frame.
    pub fn lambda_frame(&mut self) -> Option<&mut Frame> {
        self.frames.iter_mut().rev().find(|f| f.kind == FrameKind::Lambda)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shadowing_across_frames_but_not_within() {
        let mut ctx = ParserContext::new();
        ctx.push(FrameKind::Block);
        let outer = ctx.declare("x", Type::INT, 0).unwrap();
        ctx.push(FrameKind::Block);
        let inner = ctx.declare("x", Type::INT, 5).unwrap();
        assert_eq!(ctx.lookup("x").map(|v| v.id), Some(inner.id));
        assert!(ctx.declare("x", Type::INT, 9).is_err());
        ctx.pop();
        assert_eq!(ctx.lookup("x").map(|v| v.id), Some(outer.id));
    }

    #[test]
    fn break_does_not_cross_lambda_boundary() {
        let mut ctx = ParserContext::new();
        ctx.push_loop(LabelTarget::new("break"), LabelTarget::new("continue"));
        assert!(ctx.break_target().is_some());
        ctx.push_lambda(&[], LabelTarget::new("return"), None);
        assert!(ctx.break_target().is_none());
    }
}
