// Rask Value Heap
// The live-value registry: an arena of generation-checked slots owned by the
// collector, with per-kind reuse freelists and tri-phase mark-sweep.

use crate::vm::value::{
    number_to_string, FunctionKind, FunctionValue, Handle, PropMap, RegexValue, Value, KIND_COUNT,
};

/// Mark level for values reachable from an operand stack.
pub const MARK_STACK: u8 = 1;
/// Mark level for values reachable from an environment, closure-capture
/// object, or return slot.
pub const MARK_ENV: u8 = 2;

/// Collector statistics.
#[derive(Debug, Clone, Copy, Default)]
pub struct GcStats {
    pub total_allocated: usize,
    pub total_reused: usize,
    pub total_swept: usize,
    pub collections: usize,
    pub live: usize,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    mark: u8,
    pinned: bool,
    value: Option<Value>,
}

/// Sole owner of every runtime value. Everything else holds handles.
#[derive(Debug)]
pub struct Heap {
    slots: Vec<Slot>,
    freelists: [Vec<u32>; KIND_COUNT],
    stats: GcStats,

    // Pinned singletons shared by the whole runtime.
    null_handle: Handle,
    undefined_handle: Handle,
    true_handle: Handle,
    false_handle: Handle,
    zero_handle: Handle,
}

impl Heap {
    pub fn new() -> Self {
        let mut heap = Self {
            slots: Vec::new(),
            freelists: Default::default(),
            stats: GcStats::default(),
            null_handle: Handle {
                index: 0,
                generation: 0,
            },
            undefined_handle: Handle {
                index: 0,
                generation: 0,
            },
            true_handle: Handle {
                index: 0,
                generation: 0,
            },
            false_handle: Handle {
                index: 0,
                generation: 0,
            },
            zero_handle: Handle {
                index: 0,
                generation: 0,
            },
        };
        heap.null_handle = heap.pin(Value::Null);
        heap.undefined_handle = heap.pin(Value::Undefined);
        heap.true_handle = heap.pin(Value::Boolean(true));
        heap.false_handle = heap.pin(Value::Boolean(false));
        heap.zero_handle = heap.pin(Value::Number(0.0));
        heap
    }

    pub fn stats(&self) -> GcStats {
        self.stats
    }

    // ==================== Allocation ====================

    /// Allocate a value, reusing a freed slot of the same kind when one is
    /// available.
    pub fn alloc(&mut self, value: Value) -> Handle {
        let kind = value.kind() as usize;
        if let Some(index) = self.freelists[kind].pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            slot.mark = 0;
            self.stats.total_reused += 1;
            self.stats.live += 1;
            return Handle {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            mark: 0,
            pinned: false,
            value: Some(value),
        });
        self.stats.total_allocated += 1;
        self.stats.live += 1;
        Handle {
            index,
            generation: 0,
        }
    }

    /// Allocate a value the collector will never sweep. Used for the shared
    /// singletons and for materialized constant-pool entries.
    pub fn pin(&mut self, value: Value) -> Handle {
        let handle = self.alloc(value);
        self.slots[handle.index as usize].pinned = true;
        handle
    }

    pub fn null(&self) -> Handle {
        self.null_handle
    }

    pub fn undefined(&self) -> Handle {
        self.undefined_handle
    }

    pub fn boolean(&self, b: bool) -> Handle {
        if b {
            self.true_handle
        } else {
            self.false_handle
        }
    }

    pub fn zero(&self) -> Handle {
        self.zero_handle
    }

    /// Positive zero collapses onto the pinned singleton; negative zero and
    /// every other number get their own slot.
    pub fn number(&mut self, n: f64) -> Handle {
        if n == 0.0 && n.is_sign_positive() {
            self.zero_handle
        } else {
            self.alloc(Value::Number(n))
        }
    }

    pub fn string(&mut self, s: impl Into<String>) -> Handle {
        self.alloc(Value::Str(s.into()))
    }

    pub fn array(&mut self, items: Vec<Handle>) -> Handle {
        self.alloc(Value::Array(items))
    }

    pub fn object(&mut self, props: PropMap) -> Handle {
        self.alloc(Value::Object(props))
    }

    pub fn new_object(&mut self) -> Handle {
        self.alloc(Value::Object(PropMap::new()))
    }

    pub fn function(&mut self, name: impl Into<String>, kind: FunctionKind) -> Handle {
        self.alloc(Value::Function(FunctionValue {
            name: name.into(),
            kind,
        }))
    }

    pub fn regex(&mut self, value: RegexValue) -> Handle {
        self.alloc(Value::Regex(value))
    }

    // ==================== Access ====================

    /// A stale handle here is an engine bug; execution stops immediately.
    pub fn get(&self, handle: Handle) -> &Value {
        let slot = &self.slots[handle.index as usize];
        assert!(
            slot.generation == handle.generation && slot.value.is_some(),
            "stale value handle"
        );
        slot.value.as_ref().unwrap()
    }

    pub fn get_mut(&mut self, handle: Handle) -> &mut Value {
        let slot = &mut self.slots[handle.index as usize];
        assert!(
            slot.generation == handle.generation && slot.value.is_some(),
            "stale value handle"
        );
        slot.value.as_mut().unwrap()
    }

    pub fn is_live(&self, handle: Handle) -> bool {
        self.slots
            .get(handle.index as usize)
            .map(|s| s.generation == handle.generation && s.value.is_some())
            .unwrap_or(false)
    }

    pub fn same_identity(&self, a: Handle, b: Handle) -> bool {
        a == b
    }

    // ==================== Collection ====================

    /// Tri-phase mark-sweep: clear marks, mark transitively from the given
    /// roots (stack roots at level 1, environment roots at level 2), sweep
    /// every unmarked non-pinned slot onto its kind's freelist.
    pub fn collect<S, E>(&mut self, stack_roots: S, env_roots: E)
    where
        S: IntoIterator<Item = Handle>,
        E: IntoIterator<Item = Handle>,
    {
        // Phase 1: clear.
        for slot in &mut self.slots {
            slot.mark = 0;
        }

        // Phase 2: mark.
        for root in stack_roots {
            self.mark(root, MARK_STACK);
        }
        for root in env_roots {
            self.mark(root, MARK_ENV);
        }

        // Phase 3: sweep.
        for index in 0..self.slots.len() {
            let slot = &mut self.slots[index];
            if slot.pinned || slot.mark != 0 {
                continue;
            }
            let value = match slot.value.take() {
                Some(value) => value,
                None => continue,
            };
            let kind = value.kind() as usize;
            drop(value); // payload cleared with the slot
            slot.generation = slot.generation.wrapping_add(1);
            self.freelists[kind].push(index as u32);
            self.stats.total_swept += 1;
            self.stats.live -= 1;
        }
        self.stats.collections += 1;
    }

    fn mark(&mut self, root: Handle, level: u8) {
        let mut work = vec![root];
        while let Some(handle) = work.pop() {
            let slot = match self.slots.get_mut(handle.index as usize) {
                Some(slot) => slot,
                None => continue,
            };
            if slot.generation != handle.generation || slot.mark != 0 {
                continue;
            }
            slot.mark = level;
            match slot.value.as_ref() {
                Some(Value::Array(items)) => work.extend(items.iter().copied()),
                Some(Value::Object(props)) => work.extend(props.values()),
                Some(Value::Function(f)) => {
                    if let FunctionKind::Compiled {
                        closure: Some(closure),
                        ..
                    } = &f.kind
                    {
                        work.push(*closure);
                    }
                }
                _ => {}
            }
        }
    }

    // ==================== Rendering ====================

    /// Textual rendering of a value, following references. Depth-capped so
    /// cyclic graphs terminate.
    pub fn render(&self, handle: Handle) -> String {
        self.render_depth(handle, 0)
    }

    fn render_depth(&self, handle: Handle, depth: usize) -> String {
        if depth > 8 {
            return "...".to_string();
        }
        match self.get(handle) {
            Value::Number(n) => number_to_string(*n),
            Value::Str(s) => s.clone(),
            Value::Boolean(b) => b.to_string(),
            Value::Object(_) => "[object Object]".to_string(),
            Value::Array(items) => {
                let parts: Vec<String> = items
                    .iter()
                    .map(|h| match self.get(*h) {
                        Value::Null | Value::Undefined => String::new(),
                        _ => self.render_depth(*h, depth + 1),
                    })
                    .collect();
                parts.join(",")
            }
            Value::Function(f) => match f.kind {
                FunctionKind::Compiled { .. } => {
                    format!("function {}() {{ [bytecode] }}", f.name)
                }
                FunctionKind::Builtin(_) => {
                    format!("function {}() {{ [native code] }}", f.name)
                }
            },
            Value::Regex(r) => format!("/{}/", r.source),
            Value::Null => "null".to_string(),
            Value::Undefined => "undefined".to_string(),
        }
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}
