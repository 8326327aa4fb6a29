use crate::Effect;
use skein_base::Result;

// Per-execution-context append buffer. Application logic pushes effects here
// as it runs; the host drains the buffer into the scheduling pipeline at a
// boundary of its choosing. Not shared across threads: each context owns its
// collector.
#[derive(Debug, Default)]
pub struct Collector {
    effects: Vec<Effect>,
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    // Validation happens at insertion so a malformed effect is rejected close
    // to the code that built it, not deep in the pipeline.
    pub fn add(&mut self, effect: Effect) -> Result<()> {
        effect.validate()?;
        self.effects.push(effect);
        Ok(())
    }

    // All-or-nothing: every effect is validated before any is appended.
    pub fn add_many(&mut self, effects: impl IntoIterator<Item = Effect>) -> Result<()> {
        let effects: Vec<Effect> = effects.into_iter().collect();
        for effect in effects.iter() {
            effect.validate()?;
        }
        self.effects.extend(effects);
        Ok(())
    }

    // Returns everything accumulated so far and resets the buffer.
    pub fn drain(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    pub fn count(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn clear(&mut self) {
        self.effects.clear();
    }
}
