mod backends;
mod events;
mod nodes;
mod parser;
mod pipeline;
mod techniques;
mod variables;
