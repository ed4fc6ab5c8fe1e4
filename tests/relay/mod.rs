mod doppler;
mod scripted;
mod simulation;
