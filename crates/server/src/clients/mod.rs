pub mod stockfish;
