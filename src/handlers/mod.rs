// handlers/mod.rs - Two-tier handler layout
//
// Public (no auth): /, /health, /login, /auth/*
// Protected (session or JWT): /api/*, /accounting/callback
//
// Page routes under /app/* are served by the public tier behind the page gate.
pub mod protected;
pub mod public;
