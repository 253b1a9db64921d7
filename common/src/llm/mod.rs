pub mod model;
pub mod translate;

pub use model::{GeminiClient, Generator, Message, MessageRole, ModelConfig};
pub use translate::{translate_to_english, GoogleTranslator, Passthrough, Translator};
