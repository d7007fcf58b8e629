/// GUI API operations for the script VM
///
/// Message output, dialogs and screen fades. Dialogs always suspend and
/// push the chosen option; fades suspend only when asked to.
use crate::error::ScriptError;
use crate::instruction::Instruction;
use crate::interpreter::{ExecutionResult, Executor};
use crate::opcode_tables::Opcode;
use crate::suspension::WaitKind;
use crate::value::StackValue;
use log::debug;

impl Executor<'_> {
    /// Handle GUI API opcodes
    pub fn execute_gui_op(&mut self, inst: &Instruction) -> Result<ExecutionResult, ScriptError> {
        match inst.opcode {
            Opcode::Print => {
                let text = self.script.pop_string()?;
                self.engine.print(&text);
                Ok(ExecutionResult::Continue)
            }

            Opcode::ShowMessage => {
                let text = self.script.pop_string()?;
                self.require_main_interface("message outside the main interface")?;
                self.engine.show_message(&text);
                Ok(ExecutionResult::Continue)
            }

            Opcode::Dialog => {
                let text = self.script.pop_string()?;
                self.require_main_interface("dialog outside the main interface")?;
                let token = self.begin_wait(WaitKind::Window, None, true)?;
                debug!("dialog {:?} as {}", text, token);
                self.engine.open_dialog(&text, Some(token));
                Ok(self.finish_wait())
            }

            Opcode::FadeScreen => {
                let fade_in = self.pop_flag()?;
                let seconds = self.pop_seconds()?;
                let wait = self.pop_flag()?;
                if !wait {
                    self.engine.fade(fade_in, seconds, None);
                    return Ok(ExecutionResult::Continue);
                }
                let token = self.begin_wait(WaitKind::Window, None, false)?;
                self.engine.fade(fade_in, seconds, Some(token));
                Ok(self.finish_wait())
            }

            Opcode::GetInterfaceState => {
                let state = self.engine.interface_state();
                self.script.push(StackValue::Number(state.index() as f32))?;
                Ok(ExecutionResult::Continue)
            }

            _ => Err(ScriptError::UnhandledOpcode(inst.opcode.name())),
        }
    }
}
