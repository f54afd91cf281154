// The mcp module is the process surface: JSON-RPC framing for the tool
// protocol and the stdin/stdout loop that drives it. Nothing in here knows
// about Google; it only talks to the dispatcher.

#[path = "jsonrpc.rs"]
pub mod jsonrpc;

#[path = "stdio_server.rs"]
pub mod stdio;
